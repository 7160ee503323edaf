//! Configuración inmutable de una corrida: se carga una vez al arrancar y se
//! pasa a cada componente.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::artifact::{Artifact, StorageClass};
use crate::collector::{CollectTargets, CollectorSettings};
use crate::error::{Error, Result};
use crate::window::Window;
use crate::worker::{connection_pool, WorkerConnection};

pub const DEFAULT_CONFIG_PATH: &str = "pipeline.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buckets {
    pub meta: String,
    pub text: String,
    pub image: String,
    /// Programas de los jobs batch.
    pub jobs: String,
    /// CSVs del reporte.
    pub report: String,
}

impl Buckets {
    pub fn for_class(&self, class: StorageClass) -> &str {
        match class {
            StorageClass::Meta => &self.meta,
            StorageClass::Text => &self.text,
            StorageClass::Image => &self.image,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
    #[serde(default)]
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub poll_interval_secs: u64,
    pub program_dir: String,
    pub merge_files: String,
    pub merge_two_files: String,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            program_dir: "programs".into(),
            merge_files: "merge_files.json".into(),
            merge_two_files: "merge_two_files.json".into(),
        }
    }
}

/// Imágenes de contenedor que se bajan en cada conexión.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub collect: String,
    pub fetch_media: String,
    pub caption: String,
    pub sentiment: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            collect: "reddit-scrape:latest".into(),
            fetch_media: "reddit-image-scrape:latest".into(),
            caption: "reddit-image-caption:latest".into(),
            sentiment: "reddit-sentiment-analysis:latest".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub threshold: usize,
    pub politeness_secs: u64,
    pub timezone: String,
    pub page_size: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            threshold: 50,
            politeness_secs: 6,
            timezone: "America/Los_Angeles".into(),
            page_size: 100,
        }
    }
}

impl CollectorConfig {
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| Error::invalid_config(format!("zona horaria desconocida: {}", self.timezone)))
    }

    pub fn settings(&self) -> Result<CollectorSettings> {
        Ok(CollectorSettings {
            threshold: self.threshold,
            politeness: Duration::from_secs(self.politeness_secs),
            timezone: self.timezone()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    pub project_id: String,
    pub dataset_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directorio con los `*.sql`; sin directorio no hay consultas.
    pub queries_dir: Option<PathBuf>,
}

/// Plantillas de comandos remotos; `{image}` se reemplaza por la imagen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    pub pull_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub pull_template: String,
    pub run_template: String,
    pub gpu_run_template: String,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            pull_timeout_secs: 1800,
            command_timeout_secs: 10_000,
            pull_template: "sudo docker pull {image}".into(),
            run_template: "sudo docker run --rm {image}".into(),
            gpu_run_template: "sudo docker run --rm --gpus all {image}".into(),
        }
    }
}

impl ExecConfig {
    pub fn pull_command(&self, image: &str) -> String {
        self.pull_template.replace("{image}", image)
    }

    /// Prefijo para lanzar el programa worker dentro de `image`.
    pub fn run_prefix(&self, image: &str, gpu: bool) -> String {
        let template = if gpu {
            &self.gpu_run_template
        } else {
            &self.run_template
        };
        template.replace("{image}", image)
    }

    pub fn pull_timeout(&self) -> Duration {
        Duration::from_secs(self.pull_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

fn default_max_parallel() -> usize {
    8
}

fn default_store_root() -> PathBuf {
    PathBuf::from("./store")
}

fn default_enrichment() -> String {
    "local".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Sin ventana explícita se usa la semana previa.
    #[serde(default)]
    pub window: Option<Window>,
    /// Ítems de trabajo lógicos (una fuente por ítem).
    pub sources: Vec<String>,
    /// Endpoints del pool; K = cantidad.
    pub connections: Vec<String>,
    /// Host con GPU para las etapas de anotación.
    #[serde(default = "default_enrichment")]
    pub enrichment_connection: String,
    pub buckets: Buckets,
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub exec: ExecConfig,
    #[serde(default = "default_max_parallel")]
    pub max_parallel_tasks: usize,
    #[serde(default = "default_store_root")]
    pub store_root: PathBuf,
    /// Dirección del API de estado (ej: "0.0.0.0:8080"); opcional.
    #[serde(default)]
    pub status_addr: Option<String>,
}

impl PipelineConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let cfg: PipelineConfig = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::invalid_config(format!("no se pudo leer {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    /// Chequeos previos a construir el grafo; cualquier falla es fatal.
    pub fn validate(&self) -> Result<()> {
        if self.connections.is_empty() {
            return Err(Error::InvalidTopology {
                reason: "no hay conexiones configuradas".into(),
            });
        }
        if self.sources.is_empty() {
            return Err(Error::invalid_config("no hay fuentes configuradas"));
        }
        if let Some(w) = &self.window {
            w.validate()?;
        }
        if self.collector.threshold == 0 {
            return Err(Error::invalid_config("el umbral de lotes debe ser > 0"));
        }
        self.collector.timezone()?;
        if self.max_parallel_tasks == 0 {
            return Err(Error::invalid_config("max_parallel_tasks debe ser > 0"));
        }
        let b = &self.buckets;
        for (name, value) in [
            ("meta", &b.meta),
            ("text", &b.text),
            ("image", &b.image),
            ("jobs", &b.jobs),
            ("report", &b.report),
        ] {
            if value.is_empty() || value.contains('/') {
                return Err(Error::invalid_config(format!("bucket {name} inválido: {value:?}")));
            }
        }
        Ok(())
    }
}

/// Config + ventana resuelta + directorio de la corrida.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: Arc<PipelineConfig>,
    pub window: Window,
    pub directory: String,
}

impl RunContext {
    pub fn new(config: Arc<PipelineConfig>, today: NaiveDate) -> Result<Self> {
        config.validate()?;
        let window = config
            .window
            .unwrap_or_else(|| Window::trailing_week(today));
        window.validate()?;
        Ok(Self {
            directory: window.directory_name(),
            window,
            config,
        })
    }

    pub fn connections(&self) -> Vec<WorkerConnection> {
        connection_pool(&self.config.connections)
    }

    pub fn enrichment(&self) -> WorkerConnection {
        WorkerConnection::named("gpu", self.config.enrichment_connection.clone())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.config.jobs.poll_interval_secs)
    }

    /// Artefacto `{bucket de la clase}/{directorio}/{path}`.
    pub fn artifact(&self, class: StorageClass, path: &str) -> Artifact {
        Artifact::new(
            self.config.buckets.for_class(class),
            self.directory.clone(),
            path,
        )
    }

    pub fn program(&self, file: &str) -> Artifact {
        Artifact::new(
            self.config.buckets.jobs.clone(),
            self.config.jobs.program_dir.clone(),
            file,
        )
    }

    pub fn collect_targets(&self) -> CollectTargets {
        let b = &self.config.buckets;
        CollectTargets {
            meta_bucket: b.meta.clone(),
            text_bucket: b.text.clone(),
            image_bucket: b.image.clone(),
            directory: self.directory.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = r#"{
        "window": {"start": "2024-01-10", "end": "2024-01-17"},
        "sources": ["ucla", "berkeley", "stanford"],
        "connections": ["local", "local"],
        "buckets": {"meta": "meta", "text": "text", "image": "image", "jobs": "jobs", "report": "report"},
        "cluster": {"name": "cluster-a", "region": "us-west1"},
        "warehouse": {"project_id": "proj", "dataset_id": "reddit"}
    }"#;

    pub(crate) fn sample() -> PipelineConfig {
        PipelineConfig::from_json(SAMPLE).unwrap()
    }

    #[test]
    fn defaults_se_completan() {
        let cfg = sample();
        assert_eq!(cfg.jobs.poll_interval_secs, 5);
        assert_eq!(cfg.collector.threshold, 50);
        assert_eq!(cfg.collector.politeness_secs, 6);
        assert_eq!(cfg.max_parallel_tasks, 8);
        assert_eq!(cfg.enrichment_connection, "local");
        assert!(cfg.report.queries_dir.is_none());
    }

    #[test]
    fn sin_conexiones_es_topologia_invalida() {
        let mut cfg = sample();
        cfg.connections.clear();
        assert_eq!(cfg.validate().unwrap_err().kind(), "InvalidTopology");
    }

    #[test]
    fn zona_horaria_invalida_falla() {
        let mut cfg = sample();
        cfg.collector.timezone = "Marte/Olympus".into();
        assert_eq!(cfg.validate().unwrap_err().kind(), "InvalidConfig");
    }

    #[test]
    fn run_context_usa_semana_previa_sin_ventana() {
        let mut cfg = sample();
        cfg.window = None;
        let today = NaiveDate::from_ymd_opt(2024, 1, 18).unwrap();
        let ctx = RunContext::new(Arc::new(cfg), today).unwrap();
        assert_eq!(ctx.directory, "2024-01-10-2024-01-17");
        assert_eq!(ctx.connections().len(), 2);
        assert_eq!(
            ctx.artifact(StorageClass::Meta, "combined").to_string(),
            "meta/2024-01-10-2024-01-17/combined"
        );
        assert_eq!(
            ctx.program("merge_files.json").uri(),
            "store://jobs/programs/merge_files.json"
        );
    }
}
