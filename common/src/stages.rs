//! Ejecutor de etapas: traduce cada nodo del grafo a llamadas sobre los
//! colaboradores (store, jobs batch, canal remoto, warehouse).

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::annotate::Annotation;
use crate::artifact::{Artifact, StorageClass, STORE_SCHEME};
use crate::config::RunContext;
use crate::error::{Error, Result};
use crate::job::{JobParams, JobSpec, MergeKind, ProgramFile};
use crate::orchestrator::{StageExecutor, StageOutcome};
use crate::pipeline::{
    merge_task, COMBINED_DIR, COMBINED_FILE, COMBINED_PATH, IMAGE_CAPTION_PATH, IMAGE_TEXT_DIR,
    IMAGE_TEXT_FILE, IMAGE_TEXT_PATH, META_TEXT_DIR, META_TEXT_FILE, META_TEXT_PATH,
    SENTIMENT_PATH,
};
use crate::runner::{IdempotentJobRunner, JobOutcome};
use crate::services::{
    BatchJobService, ExtractFormat, LoadFormat, QueryEngine, RemoteExecChannel, WarehouseLoader,
};
use crate::store::{artifact_exists, ArtifactStore};
use crate::task::{StageKind, Task};
use crate::worker::WorkerConnection;

pub struct PipelineStages {
    ctx: RunContext,
    store: Arc<dyn ArtifactStore>,
    runner: IdempotentJobRunner,
    exec: Arc<dyn RemoteExecChannel>,
    warehouse: Arc<dyn WarehouseLoader>,
    queries: Arc<dyn QueryEngine>,
    programs: Vec<ProgramFile>,
}

impl PipelineStages {
    pub fn new(
        ctx: RunContext,
        store: Arc<dyn ArtifactStore>,
        jobs: Arc<dyn BatchJobService>,
        exec: Arc<dyn RemoteExecChannel>,
        warehouse: Arc<dyn WarehouseLoader>,
        queries: Arc<dyn QueryEngine>,
    ) -> Self {
        let runner =
            IdempotentJobRunner::new(store.clone(), jobs).with_poll_interval(ctx.poll_interval());
        Self {
            ctx,
            store,
            runner,
            exec,
            warehouse,
            queries,
            programs: Vec::new(),
        }
    }

    /// Programas que `Init` publica en el bucket de jobs.
    pub fn with_programs(mut self, programs: Vec<ProgramFile>) -> Self {
        self.programs = programs;
        self
    }

    fn directory(&self) -> &str {
        &self.ctx.directory
    }

    async fn require(&self, artifact: &Artifact) -> Result<()> {
        if artifact_exists(self.store.as_ref(), artifact).await? {
            Ok(())
        } else {
            Err(Error::MissingInput {
                path: artifact.to_string(),
            })
        }
    }

    async fn run_remote(&self, connection: &WorkerConnection, command: String) -> Result<()> {
        let timeout = self.ctx.config.exec.command_timeout();
        self.exec.run_command(connection, &command, timeout).await?;
        Ok(())
    }

    /* --------- Etapas --------- */

    async fn init(&self) -> Result<StageOutcome> {
        self.ctx.config.validate()?;
        for program in &self.programs {
            let target = self.ctx.program(&program.name);
            self.store
                .put(&target.bucket, &target.key(), program.bytes.clone())
                .await?;
            info!(program = %target, "programa publicado");
        }
        Ok(StageOutcome::Completed)
    }

    async fn pull_images(
        &self,
        connection: &WorkerConnection,
        images: &[String],
    ) -> Result<StageOutcome> {
        let exec = &self.ctx.config.exec;
        for image in images {
            self.exec
                .run_command(connection, &exec.pull_command(image), exec.pull_timeout())
                .await?;
            info!(connection = %connection.name, image, "imagen lista");
        }
        Ok(StageOutcome::Completed)
    }

    async fn collect(&self, source: &str, connection: &WorkerConnection) -> Result<StageOutcome> {
        let cfg = &self.ctx.config;
        let first_batch = format!("{}/{}-meta-", self.directory(), source);
        if self.store.exists(&cfg.buckets.meta, &first_batch).await? {
            info!(source, "la fuente ya tiene lotes en esta corrida, se omite");
            return Ok(StageOutcome::AlreadyDone);
        }

        let command = format!(
            "{} collect --source {} --directory {} --start {} --end {} \
             --meta-bucket {} --text-bucket {} --image-bucket {} \
             --threshold {} --politeness-secs {} --timezone {} --page-size {}",
            cfg.exec.run_prefix(&cfg.images.collect, false),
            source,
            self.directory(),
            self.ctx.window.lower,
            self.ctx.window.upper,
            cfg.buckets.meta,
            cfg.buckets.text,
            cfg.buckets.image,
            cfg.collector.threshold,
            cfg.collector.politeness_secs,
            cfg.collector.timezone,
            cfg.collector.page_size,
        );
        self.run_remote(connection, command).await?;
        info!(source, connection = %connection.name, "recolección terminada");
        Ok(StageOutcome::Completed)
    }

    fn merge_directory_spec(&self, class: StorageClass) -> JobSpec {
        let cfg = &self.ctx.config;
        let bucket = cfg.buckets.for_class(class).to_string();
        JobSpec {
            name: merge_task(class),
            cluster: cfg.cluster.name.clone(),
            program: self.ctx.program(&cfg.jobs.merge_files),
            inputs: vec![Artifact::new(bucket.clone(), self.directory(), "")],
            output: self.ctx.artifact(class, COMBINED_DIR),
            canonical_filename: COMBINED_FILE.to_string(),
            params: JobParams::MergeDirectory {
                bucket,
                directory: self.directory().to_string(),
                image_bucket: cfg.buckets.image.clone(),
            },
        }
    }

    fn merge_two_spec(&self, merge: MergeKind) -> JobSpec {
        let cfg = &self.ctx.config;
        let (left, right, out_class, out_dir, canonical) = match merge {
            MergeKind::CaptionText => (
                self.ctx.artifact(StorageClass::Text, COMBINED_PATH),
                self.ctx.artifact(StorageClass::Image, IMAGE_CAPTION_PATH),
                StorageClass::Text,
                IMAGE_TEXT_DIR,
                IMAGE_TEXT_FILE,
            ),
            MergeKind::MetaText => (
                self.ctx.artifact(StorageClass::Meta, COMBINED_PATH),
                self.ctx.artifact(StorageClass::Text, SENTIMENT_PATH),
                StorageClass::Meta,
                META_TEXT_DIR,
                META_TEXT_FILE,
            ),
        };
        let output = self.ctx.artifact(out_class, out_dir);

        JobSpec {
            name: format!("merge_two_{}", merge),
            cluster: cfg.cluster.name.clone(),
            program: self.ctx.program(&cfg.jobs.merge_two_files),
            params: JobParams::MergeTwo {
                directory: self.directory().to_string(),
                left_bucket: left.bucket.clone(),
                left_path: left.path.clone(),
                right_bucket: right.bucket.clone(),
                right_path: right.path.clone(),
                output_bucket: output.bucket.clone(),
                output_directory: out_dir.to_string(),
                merge,
            },
            inputs: vec![left, right],
            output,
            canonical_filename: canonical.to_string(),
        }
    }

    async fn run_job(&self, spec: JobSpec, cancel: &CancellationToken) -> Result<StageOutcome> {
        match self.runner.run(&spec, cancel).await? {
            JobOutcome::Skipped => Ok(StageOutcome::AlreadyDone),
            JobOutcome::Completed { .. } => Ok(StageOutcome::Completed),
        }
    }

    async fn fetch_media(
        &self,
        connection: &WorkerConnection,
        connections: usize,
    ) -> Result<StageOutcome> {
        let cfg = &self.ctx.config;
        self.require(&self.ctx.artifact(StorageClass::Image, COMBINED_PATH))
            .await?;

        let command = format!(
            "{} fetch-images --bucket {} --directory {} --input {} --connections {} --index {}",
            cfg.exec.run_prefix(&cfg.images.fetch_media, false),
            cfg.buckets.image,
            self.directory(),
            COMBINED_PATH,
            connections,
            connection.index,
        );
        self.run_remote(connection, command).await?;
        Ok(StageOutcome::Completed)
    }

    async fn annotate(
        &self,
        annotation: Annotation,
        connection: &WorkerConnection,
    ) -> Result<StageOutcome> {
        let cfg = &self.ctx.config;
        let (input, output, image) = match annotation {
            Annotation::Caption => (
                self.ctx.artifact(StorageClass::Image, COMBINED_PATH),
                self.ctx.artifact(StorageClass::Image, IMAGE_CAPTION_PATH),
                &cfg.images.caption,
            ),
            Annotation::Sentiment => (
                self.ctx.artifact(StorageClass::Text, IMAGE_TEXT_PATH),
                self.ctx.artifact(StorageClass::Text, SENTIMENT_PATH),
                &cfg.images.sentiment,
            ),
        };

        if artifact_exists(self.store.as_ref(), &output).await? {
            info!(%annotation, output = %output, "anotación ya hecha, se omite");
            return Ok(StageOutcome::AlreadyDone);
        }
        self.require(&input).await?;

        let command = format!(
            "{} annotate --annotation {} --input-bucket {} --output-bucket {} \
             --directory {} --input {} --output {}",
            cfg.exec.run_prefix(image, true),
            annotation,
            input.bucket,
            output.bucket,
            self.directory(),
            input.path,
            output.path,
        );
        self.run_remote(connection, command).await?;
        Ok(StageOutcome::Completed)
    }

    async fn load_warehouse(&self) -> Result<StageOutcome> {
        let source = self.ctx.artifact(StorageClass::Meta, META_TEXT_PATH);
        self.require(&source).await?;

        let dataset = &self.ctx.config.warehouse.dataset_id;
        self.warehouse
            .load(dataset, self.directory(), &source.uri(), LoadFormat::Columnar)
            .await?;
        info!(dataset = %dataset, table = self.directory(), "tabla cargada");
        Ok(StageOutcome::Completed)
    }

    async fn report(&self) -> Result<StageOutcome> {
        let cfg = &self.ctx.config;
        let Some(dir) = &cfg.report.queries_dir else {
            info!("sin directorio de consultas, no hay reporte");
            return Ok(StageOutcome::Completed);
        };

        let queries = load_queries(dir).await?;
        for (stem, template) in queries {
            let sql = render_query(
                &template,
                &cfg.warehouse.project_id,
                &cfg.warehouse.dataset_id,
                self.directory(),
            );
            let table = format!(
                "{}.{}.{}",
                cfg.warehouse.project_id, cfg.warehouse.dataset_id, stem
            );
            self.queries.run(&sql, &table).await?;

            let uri = format!(
                "{}{}/{}/{}.csv",
                STORE_SCHEME,
                cfg.buckets.report,
                self.directory(),
                stem
            );
            self.queries.extract(&table, &uri, ExtractFormat::Csv).await?;
            info!(query = %stem, destination = %uri, "reporte exportado");
        }
        Ok(StageOutcome::Completed)
    }
}

#[async_trait]
impl StageExecutor for PipelineStages {
    async fn execute(&self, task: &Task, cancel: &CancellationToken) -> Result<StageOutcome> {
        match &task.stage {
            StageKind::Init => self.init().await,
            StageKind::PullImage { connection, images } => {
                self.pull_images(connection, images).await
            }
            StageKind::Collect {
                source, connection, ..
            } => self.collect(source, connection).await,
            StageKind::MergeDirectory { class } => {
                self.run_job(self.merge_directory_spec(*class), cancel).await
            }
            StageKind::FetchMedia {
                connection,
                connections,
            } => self.fetch_media(connection, *connections).await,
            StageKind::Annotate {
                annotation,
                connection,
            } => self.annotate(*annotation, connection).await,
            StageKind::MergeTwo { merge } => self.run_job(self.merge_two_spec(*merge), cancel).await,
            StageKind::LoadWarehouse => self.load_warehouse().await,
            StageKind::Report => self.report().await,
        }
    }
}

/// `*.sql` del directorio, ordenados por nombre: (stem, texto).
async fn load_queries(dir: &Path) -> Result<Vec<(String, String)>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("sql") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut out = Vec::with_capacity(paths.len());
    for path in paths {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        out.push((stem, tokio::fs::read_to_string(&path).await?));
    }
    Ok(out)
}

/// Reemplaza `project_id`, `dataset_id` y `table_id`, con o sin llaves
/// (`{project_id}` o `project_id` a secas).
pub fn render_query(template: &str, project_id: &str, dataset_id: &str, table_id: &str) -> String {
    let mut sql = template.to_string();
    for (token, value) in [
        ("project_id", project_id),
        ("dataset_id", dataset_id),
        ("table_id", table_id),
    ] {
        sql = sql
            .replace(&format!("{{{token}}}"), value)
            .replace(token, value);
    }
    sql
}
