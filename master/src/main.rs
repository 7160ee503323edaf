mod backends;
mod handlers;
mod state;

use crate::backends::{LocalBatchJobService, LocalWarehouse, ShellExecChannel};
use crate::state::AppState;
use anyhow::Context;
use common::config::{PipelineConfig, RunContext, DEFAULT_CONFIG_PATH};
use common::orchestrator::Orchestrator;
use common::pipeline::build_pipeline;
use common::programs::builtin_programs;
use common::stages::PipelineStages;
use common::status::RunBoard;
use common::store::{ArtifactStore, LocalArtifactStore};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("master=debug,common=info,axum=info")
        .init();

    let config_path =
        std::env::var("PIPELINE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = PipelineConfig::from_file(&config_path)
        .with_context(|| format!("cargando configuración desde {}", config_path))?;
    let config = Arc::new(config);

    let today = chrono::Local::now().date_naive();
    let ctx = RunContext::new(config.clone(), today)?;
    info!(
        "corrida {} ({} fuentes, {} conexiones)",
        ctx.directory,
        config.sources.len(),
        config.connections.len()
    );

    // colaboradores locales
    let store: Arc<dyn ArtifactStore> = Arc::new(LocalArtifactStore::new(&config.store_root));
    let jobs = Arc::new(LocalBatchJobService::new(store.clone()));
    let exec = Arc::new(ShellExecChannel::new());
    let warehouse = Arc::new(LocalWarehouse::new(
        store.clone(),
        config.store_root.join("warehouse"),
    ));

    let stages = PipelineStages::new(
        ctx.clone(),
        store,
        jobs,
        exec,
        warehouse.clone(),
        warehouse,
    )
    .with_programs(builtin_programs(&config.jobs));

    let graph = build_pipeline(&ctx)?;
    let board = Arc::new(RunBoard::new(ctx.directory.clone()));

    // Ctrl-C cancela lo pendiente
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("señal recibida, cancelando la corrida");
                cancel.cancel();
            }
        });
    }

    // API de estado (opcional)
    if let Some(addr) = &config.status_addr {
        let app = handlers::build_router(AppState::new(board.clone()));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("no se pudo abrir {}", addr))?;
        info!("API de estado escuchando en {}", listener.local_addr()?);

        let shutdown = cancel.clone();
        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(e) = served {
                error!("API de estado terminó con error: {}", e);
            }
        });
    }

    let orchestrator = Orchestrator::new(Arc::new(stages), board, config.max_parallel_tasks);
    let outcome = orchestrator.run(&graph, &cancel).await?;

    if let Some(failure) = &outcome.first_error {
        error!(
            "la corrida falló en {}: {} ({})",
            failure.task, failure.kind, failure.message
        );
    } else {
        info!("corrida {} terminada sin errores", ctx.directory);
    }

    if config.status_addr.is_some() && !cancel.is_cancelled() {
        info!("la API de estado sigue activa hasta Ctrl-C");
        cancel.cancelled().await;
    }

    if !outcome.succeeded() {
        anyhow::bail!("la corrida {} no terminó bien", ctx.directory);
    }
    Ok(())
}
