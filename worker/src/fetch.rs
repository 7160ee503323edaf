use async_trait::async_trait;
use common::assign::WorkAssigner;
use common::engine::parse_jsonl;
use common::store::ArtifactStore;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Descarga de un recurso por URL.
#[async_trait]
pub trait MediaClient: Send + Sync {
    async fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>>;
}

pub struct HttpMediaClient {
    client: Client,
}

impl HttpMediaClient {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(FETCH_TIMEOUT).build()?,
        })
    }
}

#[async_trait]
impl MediaClient for HttpMediaClient {
    async fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let res = self.client.get(url).send().await?.error_for_status()?;
        Ok(res.bytes().await?.to_vec())
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub owned: usize,
    pub stored: usize,
    pub already_present: usize,
    pub failed: usize,
}

/// Qué filas del artefacto combinado le tocan a esta conexión y dónde va
/// cada imagen.
pub struct FetchPlan<'a> {
    pub bucket: &'a str,
    pub directory: &'a str,
    pub input: &'a str,
    pub connections: usize,
    pub index: usize,
}

/// Baja las imágenes de las filas `row % K == index`. Una falla por ítem se
/// registra y se sigue.
pub async fn fetch_images(
    store: &dyn ArtifactStore,
    media: &dyn MediaClient,
    plan: &FetchPlan<'_>,
) -> anyhow::Result<FetchSummary> {
    let assigner = WorkAssigner::new(plan.connections)?;
    let key = format!("{}/{}", plan.directory, plan.input);
    let rows = parse_jsonl(&store.get(plan.bucket, &key).await?)?;

    let mut summary = FetchSummary::default();
    for (row, rec) in rows.iter().enumerate() {
        if !assigner.owns(plan.index, row) {
            continue;
        }
        let (Some(url), Some(path)) = (
            rec.get("image_url").and_then(|v| v.as_str()),
            rec.get("image_path").and_then(|v| v.as_str()),
        ) else {
            continue;
        };
        summary.owned += 1;

        if store.exists(plan.bucket, path).await? {
            summary.already_present += 1;
            continue;
        }

        match media.fetch(url).await {
            Ok(bytes) => {
                store.put(plan.bucket, path, bytes).await?;
                summary.stored += 1;
            }
            Err(e) => {
                warn!("no se pudo bajar {}: {}", url, e);
                summary.failed += 1;
            }
        }
    }

    info!(
        "conexión {}/{}: {} imágenes propias, {} guardadas, {} ya estaban, {} fallidas",
        plan.index, plan.connections, summary.owned, summary.stored, summary.already_present, summary.failed
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::store::MemoryArtifactStore;
    use std::sync::Mutex;

    struct FakeMedia {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MediaClient for FakeMedia {
        async fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
            self.seen.lock().unwrap().push(url.to_string());
            if url.contains("roto") {
                anyhow::bail!("404");
            }
            Ok(url.as_bytes().to_vec())
        }
    }

    #[tokio::test]
    async fn baja_solo_las_filas_propias() {
        let store = MemoryArtifactStore::new();
        let mut body = String::new();
        for i in 0..5 {
            let host = if i == 2 { "roto" } else { "ok" };
            body.push_str(&format!(
                "{{\"id\":\"{i}\",\"image_url\":\"https://{host}/{i}.jpg\",\"image_path\":\"d/images/{i}.jpg\"}}\n"
            ));
        }
        store
            .put("image", "d/combined/combined.jsonl", body.into_bytes())
            .await
            .unwrap();
        store.put("image", "d/images/4.jpg", b"x".to_vec()).await.unwrap();

        let media = FakeMedia {
            seen: Mutex::new(Vec::new()),
        };
        let plan = FetchPlan {
            bucket: "image",
            directory: "d",
            input: "combined/combined.jsonl",
            connections: 2,
            index: 0,
        };
        let summary = fetch_images(&store, &media, &plan).await.unwrap();

        // filas 0, 2 y 4; la 4 ya estaba y la 2 falla
        assert_eq!(
            summary,
            FetchSummary {
                owned: 3,
                stored: 1,
                already_present: 1,
                failed: 1
            }
        );
        assert!(store.exists("image", "d/images/0.jpg").await.unwrap());
        assert!(!store.exists("image", "d/images/1.jpg").await.unwrap());
        assert_eq!(media.seen.lock().unwrap().len(), 2);
    }
}
