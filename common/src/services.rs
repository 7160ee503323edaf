//! Contratos de los colaboradores externos que consume la orquestación.
//!
//! Todas las implementaciones tienen que tolerar llamadas concurrentes
//! independientes (job-ids y rutas distintas nunca chocan).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::job::{JobId, JobState};
use crate::worker::WorkerConnection;

/// Servicio de jobs batch remoto (envío + consulta de estado).
#[async_trait]
pub trait BatchJobService: Send + Sync {
    async fn submit(&self, cluster: &str, program_uri: &str, args: &[String]) -> Result<JobId>;

    async fn status(&self, job_id: &str) -> Result<JobState>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadFormat {
    /// Formato columnar de los artefactos canónicos.
    Columnar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractFormat {
    Csv,
}

#[async_trait]
pub trait WarehouseLoader: Send + Sync {
    async fn load(
        &self,
        dataset: &str,
        table: &str,
        source_uri: &str,
        format: LoadFormat,
    ) -> Result<()>;
}

#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Ejecuta `sql` y deja el resultado en `destination_table`.
    async fn run(&self, sql: &str, destination_table: &str) -> Result<()>;

    async fn extract(&self, table: &str, destination_uri: &str, format: ExtractFormat)
        -> Result<()>;
}

/// Falla de inferencia de un ítem; nunca aborta el lote.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InferenceError {
    #[error("timeout de inferencia")]
    Timeout,
    #[error("inferencia fallida: {0}")]
    Failed(String),
}

/// Modelo (caption de imágenes, sentimiento) visto como función pura por lote.
/// La salida tiene el mismo largo y orden que la entrada.
#[async_trait]
pub trait InferenceService: Send + Sync {
    async fn infer(&self, inputs: &[String]) -> Vec<std::result::Result<String, InferenceError>>;
}

/// Canal para correr un comando en una conexión del pool.
#[async_trait]
pub trait RemoteExecChannel: Send + Sync {
    /// Devuelve la salida estándar; código != 0 o timeout es `Error::Exec`.
    async fn run_command(
        &self,
        connection: &WorkerConnection,
        command: &str,
        timeout: Duration,
    ) -> Result<String>;
}
