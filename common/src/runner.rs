//! Ejecución "a lo sumo una vez" de un job batch por ruta de salida.
//!
//! CheckInputs -> CheckOutputExists -> (Skip | Submit -> Poll -> Cleanup).
//! El chequeo de salida no toma locks: se asume un único escritor por
//! corrida y por etapa.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cleanup::{CleanupNormalizer, CleanupReport};
use crate::error::{Error, Result};
use crate::job::{JobId, JobSpec, JobState};
use crate::services::BatchJobService;
use crate::store::{artifact_exists, ArtifactStore};

/// Intervalo constante entre consultas de estado.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// La salida ya existía; no se envió nada.
    Skipped,
    Completed { job_id: JobId, cleanup: CleanupReport },
}

#[derive(Clone)]
pub struct IdempotentJobRunner {
    store: Arc<dyn ArtifactStore>,
    jobs: Arc<dyn BatchJobService>,
    normalizer: CleanupNormalizer,
    poll_interval: Duration,
}

impl IdempotentJobRunner {
    pub fn new(store: Arc<dyn ArtifactStore>, jobs: Arc<dyn BatchJobService>) -> Self {
        Self {
            normalizer: CleanupNormalizer::new(store.clone()),
            store,
            jobs,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub async fn run(&self, spec: &JobSpec, cancel: &CancellationToken) -> Result<JobOutcome> {
        // 1) inputs
        for input in &spec.inputs {
            if !artifact_exists(self.store.as_ref(), input).await? {
                return Err(Error::MissingInput {
                    path: input.to_string(),
                });
            }
        }

        // 2) salida ya presente => etapa hecha
        let out = &spec.output;
        if self.store.exists(&out.bucket, &out.dir_prefix()).await? {
            info!(job = %spec.name, output = %out, "salida ya existe, se omite el job");
            return Ok(JobOutcome::Skipped);
        }

        // 3) submit
        let program = &spec.program;
        if !self.store.exists(&program.bucket, &program.key()).await? {
            return Err(Error::JobFileMissing {
                uri: program.uri(),
            });
        }

        let args = spec.params.to_args();
        let job_id = self
            .jobs
            .submit(&spec.cluster, &program.uri(), &args)
            .await?;
        info!(job = %spec.name, job_id = %job_id, cluster = %spec.cluster, "job enviado");

        // 4) poll
        let state = self.wait(&job_id, cancel).await?;
        if state != JobState::Succeeded {
            warn!(job = %spec.name, job_id = %job_id, ?state, "job remoto no terminó bien");
            return Err(Error::RemoteJobFailed { job_id, state });
        }

        // 5) limpieza
        let cleanup = self
            .normalizer
            .normalize(&out.bucket, &out.dir_prefix(), &spec.canonical_filename)
            .await?;

        info!(job = %spec.name, job_id = %job_id, "job completado");
        Ok(JobOutcome::Completed { job_id, cleanup })
    }

    /// Consulta el estado a intervalo fijo hasta ver uno terminal.
    /// La cancelación corta la espera con `WaitCancelled`.
    pub async fn wait(&self, job_id: &str, cancel: &CancellationToken) -> Result<JobState> {
        loop {
            let state = self.jobs.status(job_id).await?;
            if state.is_terminal() {
                info!(job_id, ?state, "job en estado terminal");
                return Ok(state);
            }
            debug!(job_id, ?state, "job todavía en curso");

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(Error::WaitCancelled { job_id: job_id.to_string() });
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}
