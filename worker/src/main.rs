mod fetch;
mod inference;
mod source;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use common::annotate::{annotate_artifact, AnnotateOutcome, Annotation, DEFAULT_BATCH_SIZE};
use common::artifact::Artifact;
use common::collector::{CollectTargets, IncrementalCollector};
use common::config::CollectorConfig;
use common::store::{ArtifactStore, LocalArtifactStore};
use common::window::Window;
use std::{env, sync::Arc, time::Duration};
use tracing::info;

use crate::fetch::{fetch_images, FetchPlan, HttpMediaClient};
use crate::inference::{HttpInference, PathRooted};
use crate::source::{RedditSource, DEFAULT_BASE_URL};

/// Raíz del store local.
/// - En el contenedor se monta en STORE_ROOT
/// - Si no está definida, usa ./store (igual que el master)
fn store_root() -> String {
    env::var("STORE_ROOT").unwrap_or_else(|_| "./store".to_string())
}

fn source_base_url() -> String {
    env::var("SOURCE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

/// Servidor del modelo, ej: http://localhost:8000/caption
fn inference_url(annotation: Annotation) -> String {
    env::var("INFERENCE_URL")
        .unwrap_or_else(|_| format!("http://localhost:8000/{}", annotation))
}

#[derive(Parser, Debug)]
#[command(name = "worker", about = "Programas que corren en cada conexión del pool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recolecta una fuente dentro de la ventana y escribe los lotes
    Collect {
        #[arg(long)]
        source: String,
        #[arg(long)]
        directory: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long)]
        meta_bucket: String,
        #[arg(long)]
        text_bucket: String,
        #[arg(long)]
        image_bucket: String,
        #[arg(long, default_value_t = 50)]
        threshold: usize,
        #[arg(long, default_value_t = 6)]
        politeness_secs: u64,
        #[arg(long, default_value = "America/Los_Angeles")]
        timezone: String,
        #[arg(long, default_value_t = 100)]
        page_size: u32,
    },
    /// Descarga las imágenes que le tocan a esta conexión
    FetchImages {
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        directory: String,
        #[arg(long)]
        input: String,
        #[arg(long)]
        connections: usize,
        #[arg(long)]
        index: usize,
    },
    /// Agrega caption o sentimiento a un artefacto
    Annotate {
        #[arg(long)]
        annotation: String,
        #[arg(long)]
        input_bucket: String,
        #[arg(long)]
        output_bucket: String,
        #[arg(long)]
        directory: String,
        #[arg(long)]
        input: String,
        #[arg(long)]
        output: String,
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
        #[arg(long, default_value_t = 120)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("worker=debug,common=info,reqwest=info")
        .init();

    let cli = Cli::parse();

    let hostname_str = hostname::get()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let local_store = LocalArtifactStore::new(store_root());
    info!("worker en {} (store en {})", hostname_str, local_store.root().display());
    let store: Arc<dyn ArtifactStore> = Arc::new(local_store);

    match cli.command {
        Command::Collect {
            source,
            directory,
            start,
            end,
            meta_bucket,
            text_bucket,
            image_bucket,
            threshold,
            politeness_secs,
            timezone,
            page_size,
        } => {
            let settings = CollectorConfig {
                threshold,
                politeness_secs,
                timezone,
                page_size,
            }
            .settings()?;
            let window = Window::new(start, end)?;
            let targets = CollectTargets {
                meta_bucket,
                text_bucket,
                image_bucket,
                directory,
            };

            let reddit = RedditSource::new(source_base_url(), source, page_size)?;
            let collector = IncrementalCollector::new(store, window, settings, targets);
            let summary = collector.collect(&reddit).await?;
            info!(
                "recolección lista: {} posts, {} comentarios, {} archivos",
                summary.accepted_posts,
                summary.comments,
                summary.files.len()
            );
        }

        Command::FetchImages {
            bucket,
            directory,
            input,
            connections,
            index,
        } => {
            let media = HttpMediaClient::new()?;
            let plan = FetchPlan {
                bucket: &bucket,
                directory: &directory,
                input: &input,
                connections,
                index,
            };
            fetch_images(store.as_ref(), &media, &plan).await?;
        }

        Command::Annotate {
            annotation,
            input_bucket,
            output_bucket,
            directory,
            input,
            output,
            batch_size,
            timeout_secs,
        } => {
            let annotation: Annotation = annotation.parse()?;
            let http = HttpInference::new(
                inference_url(annotation),
                Duration::from_secs(timeout_secs),
            )?;
            let input = Artifact::new(input_bucket.clone(), directory.clone(), input);
            let output = Artifact::new(output_bucket, directory, output);

            let outcome = match annotation {
                // el modelo de caption lee la imagen del disco
                Annotation::Caption => {
                    let svc = PathRooted::new(http, format!("{}/{}", store_root(), input_bucket));
                    annotate_artifact(store.as_ref(), &svc, annotation, &input, &output, batch_size)
                        .await?
                }
                Annotation::Sentiment => {
                    annotate_artifact(store.as_ref(), &http, annotation, &input, &output, batch_size)
                        .await?
                }
            };
            match outcome {
                AnnotateOutcome::Skipped => info!("{} ya existía", output),
                AnnotateOutcome::Written { rows, failures } => {
                    info!("{}: {} filas ({} fallas de inferencia)", output, rows, failures)
                }
            }
        }
    }

    Ok(())
}
