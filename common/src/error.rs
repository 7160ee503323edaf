use crate::job::JobState;

/// Tipo de resultado usado en todo el crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errores de la orquestación.
///
/// Los "fatales" (topología, inputs, programa, job remoto) abortan sólo la
/// tarea dueña; el orquestador marca sus dependientes como `Skipped`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Pool de conexiones mal dimensionado (K = 0).
    #[error("topología inválida: {reason}")]
    InvalidTopology { reason: String },

    #[error("configuración inválida: {reason}")]
    InvalidConfig { reason: String },

    /// Un artefacto declarado como input no existe en el store.
    #[error("input faltante: {path}")]
    MissingInput { path: String },

    /// El programa del job batch no está publicado en el store.
    #[error("archivo del job no encontrado: {uri}")]
    JobFileMissing { uri: String },

    /// El job remoto terminó en Failed o Cancelled.
    #[error("job remoto {job_id} terminó en estado {state:?}")]
    RemoteJobFailed { job_id: String, state: JobState },

    /// La salida de un job tiene más de un shard de datos; no sabemos cuál renombrar.
    #[error("{count} shards de datos bajo {prefix}, se esperaba exactamente uno")]
    AmbiguousShards { prefix: String, count: usize },

    /// La espera de un job fue cancelada por quien la invocó.
    #[error("espera del job {job_id} cancelada")]
    WaitCancelled { job_id: String },

    #[error("job desconocido: {job_id}")]
    UnknownJob { job_id: String },

    #[error("ciclo en el grafo de tareas (involucra a {task})")]
    Cycle { task: String },

    #[error("la tarea {task} depende de {dependency}, que no está declarada")]
    UnknownDependency { task: String, dependency: String },

    #[error("tarea duplicada: {task}")]
    DuplicateTask { task: String },

    /// La tarea entró en pánico; se la trata como fallida.
    #[error("la tarea {task} terminó abruptamente: {message}")]
    Panicked { task: String, message: String },

    /// Falla del upstream al listar una página (no es por-registro).
    #[error(transparent)]
    CollectorSource(#[from] crate::collector::CollectorSourceError),

    #[error("error de storage: {message}")]
    Store { message: String },

    /// Comando remoto con código de salida != 0 o timeout.
    #[error("comando en {connection} falló: {message}")]
    Exec { connection: String, message: String },

    #[error("error del warehouse: {message}")]
    Warehouse { message: String },

    #[error("error del motor de consultas: {message}")]
    Query { message: String },

    #[error("error de serialización: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("error de IO: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Nombre corto del tipo de error, el que se reporta al operador
    /// junto con la ruta o el job-id.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTopology { .. } => "InvalidTopology",
            Self::InvalidConfig { .. } => "InvalidConfig",
            Self::MissingInput { .. } => "MissingInput",
            Self::JobFileMissing { .. } => "JobFileMissing",
            Self::RemoteJobFailed { .. } => "RemoteJobFailed",
            Self::AmbiguousShards { .. } => "AmbiguousShards",
            Self::WaitCancelled { .. } => "WaitCancelled",
            Self::UnknownJob { .. } => "UnknownJob",
            Self::Cycle { .. } => "Cycle",
            Self::UnknownDependency { .. } => "UnknownDependency",
            Self::DuplicateTask { .. } => "DuplicateTask",
            Self::Panicked { .. } => "Panicked",
            Self::CollectorSource(_) => "CollectorSourceError",
            Self::Store { .. } => "Store",
            Self::Exec { .. } => "Exec",
            Self::Warehouse { .. } => "Warehouse",
            Self::Query { .. } => "Query",
            Self::Serialization(_) => "Serialization",
            Self::Io(_) => "Io",
        }
    }
}
