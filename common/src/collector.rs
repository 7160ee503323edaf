//! Recolección incremental de posts + comentarios dentro de una ventana de
//! fechas, con lotes tipados que se vuelcan al llegar a un umbral.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::artifact::{join_key, StorageClass};
use crate::error::Result;
use crate::store::ArtifactStore;
use crate::window::{Placement, Window};

pub const DEFAULT_THRESHOLD: usize = 50;
pub const DEFAULT_POLITENESS: Duration = Duration::from_secs(6);
pub const COMMENT_URL_BASE: &str = "https://www.reddit.com";

/* --------- Modelo de la fuente --------- */

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    /// Segundos desde epoch, UTC.
    pub created_utc: f64,
    pub url: Option<String>,
    pub score: i64,
    pub title: Option<String>,
    pub selftext: Option<String>,
    pub author: Option<Author>,
    pub post_hint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub created_utc: f64,
    pub permalink: Option<String>,
    pub score: i64,
    pub body: Option<String>,
    pub author: Option<Author>,
    #[serde(default)]
    pub replies: Vec<Comment>,
}

/// Una página del listado (más nuevo primero) y el cursor a la siguiente.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub posts: Vec<Post>,
    pub after: Option<String>,
}

/// La fuente no respondió para un registro o página.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fuente no disponible para {record}: {message}")]
pub struct CollectorSourceError {
    pub record: String,
    pub message: String,
}

/// Listado paginado de una comunidad.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Nombre lógico (ej: el subreddit); prefija los archivos de salida.
    fn name(&self) -> &str;

    async fn page(&self, after: Option<&str>) -> std::result::Result<Page, CollectorSourceError>;

    /// Árbol completo de comentarios de un post.
    async fn comments(&self, post_id: &str)
        -> std::result::Result<Vec<Comment>, CollectorSourceError>;
}

/* --------- Filas de salida --------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaRecord {
    pub id: String,
    pub url: Option<String>,
    pub score: i64,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
    /// `None` para posts; id del padre inmediato para comentarios.
    pub parent: Option<String>,
    pub create_date: NaiveDate,
    pub subreddit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRecord {
    pub id: String,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub image_url: String,
}

fn author_fields(author: &Option<Author>) -> (Option<String>, Option<String>) {
    match author {
        Some(a) => (a.id.clone(), a.name.clone()),
        None => (None, None),
    }
}

impl MetaRecord {
    pub fn from_post(post: &Post, create_date: NaiveDate, subreddit: &str) -> Self {
        let (author_id, author_name) = author_fields(&post.author);
        Self {
            id: post.id.clone(),
            url: post.url.clone(),
            score: post.score,
            author_id,
            author_name,
            parent: None,
            create_date,
            subreddit: subreddit.to_string(),
        }
    }

    pub fn from_comment(
        comment: &Comment,
        parent: &str,
        create_date: NaiveDate,
        subreddit: &str,
    ) -> Self {
        let (author_id, author_name) = author_fields(&comment.author);
        Self {
            id: comment.id.clone(),
            url: comment
                .permalink
                .as_ref()
                .map(|p| format!("{}{}", COMMENT_URL_BASE, p)),
            score: comment.score,
            author_id,
            author_name,
            parent: Some(parent.to_string()),
            create_date,
            subreddit: subreddit.to_string(),
        }
    }
}

impl TextRecord {
    /// Título + "\n" + cuerpo; sin alguno de los dos no hay texto.
    pub fn from_post(post: &Post) -> Self {
        let text = match (&post.title, &post.selftext) {
            (Some(title), Some(body)) => Some(format!("{}\n{}", title, body)),
            _ => None,
        };
        Self {
            id: post.id.clone(),
            text,
        }
    }

    pub fn from_comment(comment: &Comment) -> Self {
        Self {
            id: comment.id.clone(),
            text: comment.body.clone(),
        }
    }
}

impl ImageRecord {
    /// Sólo los posts marcados como imagen.
    pub fn from_post(post: &Post) -> Option<Self> {
        match (post.post_hint.as_deref(), &post.url) {
            (Some("image"), Some(url)) => Some(Self {
                id: post.id.clone(),
                image_url: url.clone(),
            }),
            _ => None,
        }
    }
}

/// Fecha local (en `tz`) de un timestamp UTC en segundos.
pub fn local_date(created_utc: f64, tz: Tz) -> Option<NaiveDate> {
    if !created_utc.is_finite() {
        return None;
    }
    let utc = DateTime::from_timestamp(created_utc.floor() as i64, 0)?;
    Some(utc.with_timezone(&tz).date_naive())
}

/* --------- Lotes --------- */

/// Lote de un tipo de registro. Se vuelca al store en cuanto llega a
/// `threshold`; cada volcado usa el siguiente número de secuencia.
pub struct Batch<T> {
    class: StorageClass,
    bucket: String,
    directory: String,
    source: String,
    threshold: usize,
    sequence: u32,
    records: Vec<T>,
    written: usize,
    files: Vec<String>,
}

impl<T: Serialize> Batch<T> {
    pub fn new(
        class: StorageClass,
        bucket: impl Into<String>,
        directory: impl Into<String>,
        source: impl Into<String>,
        threshold: usize,
    ) -> Self {
        Self {
            class,
            bucket: bucket.into(),
            directory: directory.into(),
            source: source.into(),
            threshold: threshold.max(1),
            sequence: 1,
            records: Vec::new(),
            written: 0,
            files: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total de registros ya escritos.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub async fn push(&mut self, store: &dyn ArtifactStore, record: T) -> Result<()> {
        self.records.push(record);
        if self.records.len() >= self.threshold {
            self.flush(store).await?;
        }
        Ok(())
    }

    /// Escribe lo acumulado (si hay algo) como `{source}-{kind}-{seq}.jsonl`.
    pub async fn flush(&mut self, store: &dyn ArtifactStore) -> Result<()> {
        if self.records.is_empty() {
            return Ok(());
        }

        let mut body = Vec::new();
        for rec in &self.records {
            serde_json::to_writer(&mut body, rec)?;
            body.push(b'\n');
        }

        let file = format!(
            "{}-{}-{}.jsonl",
            self.source,
            self.class.as_str(),
            self.sequence
        );
        let key = join_key(&[&self.directory, &file]);
        store.put(&self.bucket, &key, body).await?;

        info!(
            bucket = %self.bucket,
            file = %key,
            rows = self.records.len(),
            "lote volcado"
        );

        self.written += self.records.len();
        self.files.push(key);
        self.sequence += 1;
        self.records.clear();
        Ok(())
    }
}

/* --------- Recolector --------- */

/// Espera fija entre dos pedidos consecutivos a la fuente.
struct Pacer {
    delay: Duration,
    first: bool,
}

impl Pacer {
    fn new(delay: Duration) -> Self {
        Self { delay, first: true }
    }

    async fn before_request(&mut self) {
        if self.first {
            self.first = false;
            return;
        }
        tokio::time::sleep(self.delay).await;
    }
}

#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub threshold: usize,
    pub politeness: Duration,
    pub timezone: Tz,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            politeness: DEFAULT_POLITENESS,
            timezone: chrono_tz::America::Los_Angeles,
        }
    }
}

/// Buckets de destino y directorio de la corrida.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectTargets {
    pub meta_bucket: String,
    pub text_bucket: String,
    pub image_bucket: String,
    pub directory: String,
}

impl CollectTargets {
    pub fn bucket_for(&self, class: StorageClass) -> &str {
        match class {
            StorageClass::Meta => &self.meta_bucket,
            StorageClass::Text => &self.text_bucket,
            StorageClass::Image => &self.image_bucket,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectSummary {
    pub accepted_posts: usize,
    pub comments: usize,
    pub skipped_newer: usize,
    pub meta_rows: usize,
    pub text_rows: usize,
    pub image_rows: usize,
    pub files: Vec<String>,
}

struct Batches {
    meta: Batch<MetaRecord>,
    text: Batch<TextRecord>,
    image: Batch<ImageRecord>,
}

impl Batches {
    async fn flush_all(&mut self, store: &dyn ArtifactStore) -> Result<()> {
        self.meta.flush(store).await?;
        self.text.flush(store).await?;
        self.image.flush(store).await?;
        Ok(())
    }
}

pub struct IncrementalCollector {
    store: Arc<dyn ArtifactStore>,
    window: Window,
    settings: CollectorSettings,
    targets: CollectTargets,
}

impl IncrementalCollector {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        window: Window,
        settings: CollectorSettings,
        targets: CollectTargets,
    ) -> Self {
        Self {
            store,
            window,
            settings,
            targets,
        }
    }

    /// Recorre la fuente (más nuevo primero) hasta la primera fecha anterior
    /// a la ventana o hasta que no haya más páginas.
    pub async fn collect(&self, source: &dyn PostSource) -> Result<CollectSummary> {
        let name = source.name().to_string();
        let threshold = self.settings.threshold;
        let batch = |class: StorageClass| {
            (
                class,
                self.targets.bucket_for(class).to_string(),
                self.targets.directory.clone(),
            )
        };

        let (c, b, d) = batch(StorageClass::Meta);
        let meta = Batch::new(c, b, d, name.clone(), threshold);
        let (c, b, d) = batch(StorageClass::Text);
        let text = Batch::new(c, b, d, name.clone(), threshold);
        let (c, b, d) = batch(StorageClass::Image);
        let image = Batch::new(c, b, d, name.clone(), threshold);
        let mut batches = Batches { meta, text, image };

        let mut summary = CollectSummary::default();
        let result = self.scan(source, &mut batches, &mut summary).await;

        // lo acumulado se escribe también si la fuente falló a mitad
        let flushed = batches.flush_all(self.store.as_ref()).await;
        result?;
        flushed?;

        summary.meta_rows = batches.meta.written();
        summary.text_rows = batches.text.written();
        summary.image_rows = batches.image.written();
        summary.files = batches
            .meta
            .files()
            .iter()
            .chain(batches.text.files())
            .chain(batches.image.files())
            .cloned()
            .collect();

        info!(
            source = %name,
            posts = summary.accepted_posts,
            comments = summary.comments,
            files = summary.files.len(),
            "recolección terminada"
        );
        Ok(summary)
    }

    async fn scan(
        &self,
        source: &dyn PostSource,
        batches: &mut Batches,
        summary: &mut CollectSummary,
    ) -> Result<()> {
        let store = self.store.as_ref();
        let name = source.name();
        let tz = self.settings.timezone;
        let mut pacer = Pacer::new(self.settings.politeness);
        let mut after: Option<String> = None;

        loop {
            pacer.before_request().await;
            let page = source.page(after.as_deref()).await?;
            debug!(source = name, posts = page.posts.len(), "página recibida");

            for post in &page.posts {
                let Some(date) = local_date(post.created_utc, tz) else {
                    warn!(source = name, post = %post.id, "timestamp inválido, se ignora el post");
                    continue;
                };

                match self.window.classify(date) {
                    Placement::Newer => {
                        summary.skipped_newer += 1;
                        continue;
                    }
                    Placement::Older => {
                        info!(source = name, post = %post.id, %date, "fecha anterior a la ventana, fin del recorrido");
                        return Ok(());
                    }
                    Placement::Accept => {}
                }

                summary.accepted_posts += 1;
                batches
                    .meta
                    .push(store, MetaRecord::from_post(post, date, name))
                    .await?;
                if let Some(img) = ImageRecord::from_post(post) {
                    batches.image.push(store, img).await?;
                }
                batches.text.push(store, TextRecord::from_post(post)).await?;

                pacer.before_request().await;
                let comments = match source.comments(&post.id).await {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(source = name, post = %post.id, error = %e, "no se pudieron leer los comentarios");
                        Vec::new()
                    }
                };

                // pre-orden; cada comentario hereda la fecha del padre si la suya es inválida
                let mut stack: Vec<(&str, NaiveDate, &Comment)> = comments
                    .iter()
                    .rev()
                    .map(|c| (post.id.as_str(), date, c))
                    .collect();
                while let Some((parent, parent_date, comment)) = stack.pop() {
                    let own = local_date(comment.created_utc, tz).unwrap_or(parent_date);
                    batches
                        .meta
                        .push(store, MetaRecord::from_comment(comment, parent, own, name))
                        .await?;
                    batches
                        .text
                        .push(store, TextRecord::from_comment(comment))
                        .await?;
                    summary.comments += 1;

                    for reply in comment.replies.iter().rev() {
                        stack.push((comment.id.as_str(), own, reply));
                    }
                }
            }

            match page.after {
                Some(next) => after = Some(next),
                None => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryArtifactStore;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn ts(date: &str) -> f64 {
        // mediodía UTC cae el mismo día en Los Ángeles
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp() as f64
    }

    fn post(id: &str, date: &str) -> Post {
        Post {
            id: id.into(),
            created_utc: ts(date),
            url: Some(format!("https://i.redd.it/{id}.jpg")),
            score: 1,
            title: Some(format!("titulo {id}")),
            selftext: Some("cuerpo".into()),
            author: Some(Author {
                id: Some("a1".into()),
                name: Some("ana".into()),
            }),
            post_hint: None,
        }
    }

    fn comment(id: &str, date: &str, replies: Vec<Comment>) -> Comment {
        Comment {
            id: id.into(),
            created_utc: ts(date),
            permalink: Some(format!("/r/ucla/comments/{id}/")),
            score: 0,
            body: Some(format!("texto {id}")),
            author: None,
            replies,
        }
    }

    /// Fuente con guion: páginas fijas, comentarios por post y errores opcionales.
    #[derive(Default)]
    struct ScriptedSource {
        pages: Vec<Page>,
        comments: HashMap<String, Vec<Comment>>,
        failing_comments: Vec<String>,
        failing_page: Option<usize>,
        page_requests: Mutex<usize>,
        comment_requests: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PostSource for ScriptedSource {
        fn name(&self) -> &str {
            "ucla"
        }

        async fn page(
            &self,
            after: Option<&str>,
        ) -> std::result::Result<Page, CollectorSourceError> {
            *self.page_requests.lock().unwrap() += 1;
            let idx = match after {
                None => 0,
                Some(a) => a.parse::<usize>().unwrap(),
            };
            if self.failing_page == Some(idx) {
                return Err(CollectorSourceError {
                    record: format!("page {idx}"),
                    message: "503".into(),
                });
            }
            Ok(self.pages[idx].clone())
        }

        async fn comments(
            &self,
            post_id: &str,
        ) -> std::result::Result<Vec<Comment>, CollectorSourceError> {
            self.comment_requests.lock().unwrap().push(post_id.to_string());
            if self.failing_comments.iter().any(|p| p == post_id) {
                return Err(CollectorSourceError {
                    record: post_id.into(),
                    message: "404".into(),
                });
            }
            Ok(self.comments.get(post_id).cloned().unwrap_or_default())
        }
    }

    fn paged(posts: Vec<Post>, per_page: usize) -> Vec<Page> {
        let chunks: Vec<Vec<Post>> = posts.chunks(per_page).map(|c| c.to_vec()).collect();
        let n = chunks.len();
        chunks
            .into_iter()
            .enumerate()
            .map(|(i, posts)| Page {
                posts,
                after: if i + 1 < n { Some((i + 1).to_string()) } else { None },
            })
            .collect()
    }

    fn collector(store: Arc<MemoryArtifactStore>, threshold: usize) -> IncrementalCollector {
        let window = Window::new(
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 17).unwrap(),
        )
        .unwrap();
        IncrementalCollector::new(
            store,
            window,
            CollectorSettings {
                threshold,
                ..CollectorSettings::default()
            },
            CollectTargets {
                meta_bucket: "meta".into(),
                text_bucket: "text".into(),
                image_bucket: "image".into(),
                directory: "2024-01-10-2024-01-17".into(),
            },
        )
    }

    async fn rows(store: &MemoryArtifactStore, bucket: &str) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        for name in store.names(bucket) {
            let bytes = store.get(bucket, &name).await.unwrap();
            for line in String::from_utf8(bytes).unwrap().lines() {
                out.push(serde_json::from_str(line).unwrap());
            }
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn ventana_saltea_nuevos_acepta_y_corta_en_viejos() {
        let source = ScriptedSource {
            pages: vec![
                Page {
                    posts: vec![
                        post("p1", "2024-01-18"),
                        post("p2", "2024-01-15"),
                        post("p3", "2024-01-09"),
                    ],
                    after: Some("1".into()),
                },
                Page {
                    posts: vec![post("p4", "2024-01-12")],
                    after: None,
                },
            ],
            ..Default::default()
        };
        let store = Arc::new(MemoryArtifactStore::new());

        let summary = collector(store.clone(), 50).collect(&source).await.unwrap();

        assert_eq!(summary.accepted_posts, 1);
        assert_eq!(summary.skipped_newer, 1);
        assert_eq!(*source.page_requests.lock().unwrap(), 1);
        assert_eq!(*source.comment_requests.lock().unwrap(), vec!["p2".to_string()]);

        let meta = rows(&store, "meta").await;
        assert_eq!(meta.len(), 1);
        assert_eq!(meta[0]["id"], "p2");
        assert_eq!(meta[0]["create_date"], "2024-01-15");
        assert_eq!(meta[0]["subreddit"], "ucla");
        assert!(meta[0]["parent"].is_null());

        let text = rows(&store, "text").await;
        assert_eq!(text[0]["text"], "titulo p2\ncuerpo");
    }

    #[tokio::test(start_paused = true)]
    async fn umbral_50_con_120_registros_produce_tres_archivos() {
        let posts: Vec<Post> = (0..120).map(|i| post(&format!("p{i}"), "2024-01-15")).collect();
        let source = ScriptedSource {
            pages: paged(posts, 25),
            ..Default::default()
        };
        let store = Arc::new(MemoryArtifactStore::new());

        let summary = collector(store.clone(), 50).collect(&source).await.unwrap();

        assert_eq!(summary.meta_rows, 120);
        assert_eq!(
            store.names("meta"),
            vec![
                "2024-01-10-2024-01-17/ucla-meta-1.jsonl",
                "2024-01-10-2024-01-17/ucla-meta-2.jsonl",
                "2024-01-10-2024-01-17/ucla-meta-3.jsonl",
            ]
        );

        let sizes: Vec<usize> = {
            let mut v = Vec::new();
            for name in store.names("meta") {
                let bytes = store.get("meta", &name).await.unwrap();
                v.push(String::from_utf8(bytes).unwrap().lines().count());
            }
            v
        };
        assert_eq!(sizes, vec![50, 50, 20]);
        // sin imágenes no se escribe ningún archivo de imagen
        assert!(store.names("image").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn comentarios_anidados_llevan_el_padre_inmediato() {
        let mut p = post("p1", "2024-01-15");
        p.post_hint = Some("image".into());
        let mut comments = HashMap::new();
        comments.insert(
            "p1".to_string(),
            vec![
                comment("c1", "2024-01-16", vec![comment("c2", "2024-01-19", vec![])]),
                comment("c3", "2024-01-15", vec![]),
            ],
        );
        let source = ScriptedSource {
            pages: vec![Page {
                posts: vec![p],
                after: None,
            }],
            comments,
            ..Default::default()
        };
        let store = Arc::new(MemoryArtifactStore::new());

        let summary = collector(store.clone(), 50).collect(&source).await.unwrap();
        assert_eq!(summary.comments, 3);

        let meta = rows(&store, "meta").await;
        let ids: Vec<&str> = meta.iter().map(|m| m["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["p1", "c1", "c2", "c3"]);
        assert_eq!(meta[1]["parent"], "p1");
        assert_eq!(meta[2]["parent"], "c1");
        assert_eq!(meta[3]["parent"], "p1");
        // fuera de la ventana pero igual aceptado: el padre ya fue aceptado
        assert_eq!(meta[2]["create_date"], "2024-01-19");
        assert_eq!(
            meta[1]["url"],
            "https://www.reddit.com/r/ucla/comments/c1/"
        );

        let images = rows(&store, "image").await;
        assert_eq!(images.len(), 1);
        assert_eq!(images[0]["image_url"], "https://i.redd.it/p1.jpg");
    }

    #[tokio::test(start_paused = true)]
    async fn falla_de_comentarios_no_corta_el_recorrido() {
        let source = ScriptedSource {
            pages: vec![Page {
                posts: vec![post("p1", "2024-01-15"), post("p2", "2024-01-14")],
                after: None,
            }],
            failing_comments: vec!["p1".into()],
            ..Default::default()
        };
        let store = Arc::new(MemoryArtifactStore::new());

        let summary = collector(store.clone(), 50).collect(&source).await.unwrap();
        assert_eq!(summary.accepted_posts, 2);
        assert_eq!(summary.comments, 0);
        assert_eq!(summary.meta_rows, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn falla_de_pagina_vuelca_lo_acumulado_y_propaga() {
        let source = ScriptedSource {
            pages: vec![Page {
                posts: vec![post("p1", "2024-01-15")],
                after: Some("1".into()),
            }],
            failing_page: Some(1),
            ..Default::default()
        };
        let store = Arc::new(MemoryArtifactStore::new());

        let err = collector(store.clone(), 50)
            .collect(&source)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "CollectorSourceError");
        assert_eq!(store.names("meta").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn espera_fija_entre_pedidos() {
        let source = ScriptedSource {
            pages: vec![Page {
                posts: vec![post("p1", "2024-01-15"), post("p2", "2024-01-14")],
                after: None,
            }],
            ..Default::default()
        };
        let store = Arc::new(MemoryArtifactStore::new());

        let start = tokio::time::Instant::now();
        collector(store, 50).collect(&source).await.unwrap();

        // 1 página + 2 pedidos de comentarios = 3 pedidos, 2 esperas
        assert_eq!(start.elapsed(), DEFAULT_POLITENESS * 2);
    }

    #[test]
    fn local_date_convierte_a_la_zona_horaria() {
        // 2024-01-15 03:00 UTC es todavía 14 de enero en Los Ángeles
        let t = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(3, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp() as f64;
        assert_eq!(
            local_date(t, chrono_tz::America::Los_Angeles),
            NaiveDate::from_ymd_opt(2024, 1, 14)
        );
        assert_eq!(local_date(f64::NAN, chrono_tz::UTC), None);
    }
}
