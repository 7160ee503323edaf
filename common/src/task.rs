use serde::{Deserialize, Serialize};

use crate::annotate::Annotation;
use crate::artifact::StorageClass;
use crate::job::MergeKind;
use crate::worker::WorkerConnection;

pub type TaskId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Skipped
        )
    }
}

/// Qué hace cada nodo del grafo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageKind {
    /// Valida la corrida y publica los programas batch.
    Init,
    /// Baja las imágenes de contenedor en una conexión.
    PullImage {
        connection: WorkerConnection,
        images: Vec<String>,
    },
    /// Recolección de una fuente (ítem `item`) en la conexión asignada.
    Collect {
        item: usize,
        source: String,
        connection: WorkerConnection,
    },
    /// Junta los lotes de una clase en `combined/combined.jsonl`.
    MergeDirectory { class: StorageClass },
    /// Descarga las imágenes que le tocan a la conexión.
    FetchMedia {
        connection: WorkerConnection,
        connections: usize,
    },
    Annotate {
        annotation: Annotation,
        connection: WorkerConnection,
    },
    MergeTwo { merge: MergeKind },
    LoadWarehouse,
    Report,
}

impl StageKind {
    /// Conexión que ocupa la tarea (capacidad 1), si usa alguna.
    pub fn connection(&self) -> Option<&WorkerConnection> {
        match self {
            StageKind::PullImage { connection, .. }
            | StageKind::Collect { connection, .. }
            | StageKind::FetchMedia { connection, .. }
            | StageKind::Annotate { connection, .. } => Some(connection),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StageKind::Init => "init",
            StageKind::PullImage { .. } => "pull_image",
            StageKind::Collect { .. } => "collect",
            StageKind::MergeDirectory { .. } => "merge_directory",
            StageKind::FetchMedia { .. } => "fetch_media",
            StageKind::Annotate { .. } => "annotate",
            StageKind::MergeTwo { .. } => "merge_two",
            StageKind::LoadWarehouse => "load_warehouse",
            StageKind::Report => "report",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub stage: StageKind,
    /// Predecesores, en el orden en que se declararon.
    pub inputs: Vec<TaskId>,
    pub status: TaskStatus,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, stage: StageKind, inputs: Vec<TaskId>) -> Self {
        Self {
            id: id.into(),
            stage,
            inputs,
            status: TaskStatus::Pending,
        }
    }
}
