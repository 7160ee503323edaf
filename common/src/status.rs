use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::task::{Task, TaskId, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Error fatal de una tarea, con lo necesario para diagnosticar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub task: TaskId,
    /// Ej: "RemoteJobFailed", "MissingInput".
    pub kind: String,
    pub message: String,
}

impl TaskFailure {
    pub fn from_error(task: &str, err: &Error) -> Self {
        Self {
            task: task.to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub id: TaskId,
    pub stage: String,
    pub inputs: Vec<TaskId>,
    pub connection: Option<String>,
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// `true` si la etapa encontró su salida ya hecha.
    pub already_done: bool,
    pub error: Option<TaskFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInfo {
    pub directory: String,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,

    /// -------- Conteos por estado --------
    pub total_tasks: usize,
    pub pending: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,

    /// Primer error fatal de la corrida.
    pub first_error: Option<TaskFailure>,
}

#[derive(Debug)]
struct BoardState {
    run: RunInfo,
    order: Vec<TaskId>,
    tasks: HashMap<TaskId, TaskInfo>,
}

/// Tablero compartido con el estado de la corrida; lo escribe el orquestador
/// y lo lee el API HTTP.
#[derive(Debug)]
pub struct RunBoard {
    state: Mutex<BoardState>,
}

impl RunBoard {
    pub fn new(directory: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(BoardState {
                run: RunInfo {
                    directory: directory.into(),
                    status: RunStatus::Pending,
                    started_at: None,
                    finished_at: None,
                    total_tasks: 0,
                    pending: 0,
                    running: 0,
                    succeeded: 0,
                    failed: 0,
                    skipped: 0,
                    first_error: None,
                },
                order: Vec::new(),
                tasks: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registra las tareas del grafo y marca la corrida como en curso.
    pub fn start_run(&self, tasks: &[Task]) {
        let mut st = self.lock();
        st.order = tasks.iter().map(|t| t.id.clone()).collect();
        st.tasks = tasks
            .iter()
            .map(|t| {
                (
                    t.id.clone(),
                    TaskInfo {
                        id: t.id.clone(),
                        stage: t.stage.label().to_string(),
                        inputs: t.inputs.clone(),
                        connection: t.stage.connection().map(|c| c.name.clone()),
                        status: t.status,
                        started_at: None,
                        finished_at: None,
                        already_done: false,
                        error: None,
                    },
                )
            })
            .collect();
        st.run.status = RunStatus::Running;
        st.run.started_at = Some(Utc::now());
        st.run.finished_at = None;
        st.run.first_error = None;
    }

    pub fn mark_running(&self, id: &str) {
        let mut st = self.lock();
        if let Some(t) = st.tasks.get_mut(id) {
            t.status = TaskStatus::Running;
            t.started_at = Some(Utc::now());
        }
    }

    pub fn mark_succeeded(&self, id: &str, already_done: bool) {
        let mut st = self.lock();
        if let Some(t) = st.tasks.get_mut(id) {
            t.status = TaskStatus::Succeeded;
            t.already_done = already_done;
            t.finished_at = Some(Utc::now());
        }
    }

    pub fn mark_failed(&self, id: &str, err: &Error) {
        let failure = TaskFailure::from_error(id, err);
        let mut st = self.lock();
        if st.run.first_error.is_none() {
            st.run.first_error = Some(failure.clone());
        }
        if let Some(t) = st.tasks.get_mut(id) {
            t.status = TaskStatus::Failed;
            t.finished_at = Some(Utc::now());
            t.error = Some(failure);
        }
    }

    pub fn mark_skipped(&self, id: &str) {
        let mut st = self.lock();
        if let Some(t) = st.tasks.get_mut(id) {
            t.status = TaskStatus::Skipped;
            t.finished_at = Some(Utc::now());
        }
    }

    pub fn finish_run(&self, status: RunStatus) {
        let mut st = self.lock();
        st.run.status = status;
        st.run.finished_at = Some(Utc::now());
    }

    pub fn run_info(&self) -> RunInfo {
        let st = self.lock();
        let mut info = st.run.clone();
        info.total_tasks = st.tasks.len();
        info.pending = 0;
        info.running = 0;
        info.succeeded = 0;
        info.failed = 0;
        info.skipped = 0;
        for t in st.tasks.values() {
            match t.status {
                TaskStatus::Pending => info.pending += 1,
                TaskStatus::Running => info.running += 1,
                TaskStatus::Succeeded => info.succeeded += 1,
                TaskStatus::Failed => info.failed += 1,
                TaskStatus::Skipped => info.skipped += 1,
            }
        }
        info
    }

    /// Tareas en el orden en que se registraron.
    pub fn tasks(&self) -> Vec<TaskInfo> {
        let st = self.lock();
        st.order
            .iter()
            .filter_map(|id| st.tasks.get(id).cloned())
            .collect()
    }

    pub fn task(&self, id: &str) -> Option<TaskInfo> {
        self.lock().tasks.get(id).cloned()
    }
}
