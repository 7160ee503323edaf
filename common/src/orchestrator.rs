//! Ejecución del grafo con paralelismo acotado.
//!
//! Una tarea corre sólo cuando todos sus predecesores terminaron en
//! Succeeded; si alguno falló (o fue salteado) la tarea pasa a Skipped sin
//! correr. Las tareas que comparten conexión se serializan.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::dag::PipelineGraph;
use crate::error::{Error, Result};
use crate::status::{RunBoard, RunStatus, TaskFailure};
use crate::task::{Task, TaskId, TaskStatus};
use crate::worker::WorkerConnection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    /// La salida ya estaba; no se hizo nada.
    AlreadyDone,
}

/// Lo que efectivamente corre cada tarea.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    async fn execute(&self, task: &Task, cancel: &CancellationToken) -> Result<StageOutcome>;
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    /// Estado final de cada tarea, en orden topológico.
    pub tasks: Vec<(TaskId, TaskStatus)>,
    pub first_error: Option<TaskFailure>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn status_of(&self, id: &str) -> Option<TaskStatus> {
        self.tasks.iter().find(|(t, _)| t == id).map(|(_, s)| *s)
    }
}

pub struct Orchestrator {
    executor: Arc<dyn StageExecutor>,
    board: Arc<RunBoard>,
    max_parallel: usize,
}

impl Orchestrator {
    pub fn new(executor: Arc<dyn StageExecutor>, board: Arc<RunBoard>, max_parallel: usize) -> Self {
        Self {
            executor,
            board,
            max_parallel: max_parallel.max(1),
        }
    }

    pub fn board(&self) -> Arc<RunBoard> {
        self.board.clone()
    }

    /// Corre el grafo hasta que todas las tareas queden en estado terminal.
    /// Sólo devuelve `Err` si el grafo es inválido; las fallas de tareas van
    /// en el `RunOutcome`.
    pub async fn run(&self, graph: &PipelineGraph, cancel: &CancellationToken) -> Result<RunOutcome> {
        let order = graph.validate()?;
        self.board.start_run(graph.tasks());

        let mut status: HashMap<TaskId, TaskStatus> = graph
            .tasks()
            .iter()
            .map(|t| (t.id.clone(), TaskStatus::Pending))
            .collect();

        let global = Arc::new(Semaphore::new(self.max_parallel));
        let mut lanes: HashMap<String, Arc<Semaphore>> = HashMap::new();
        for task in graph.tasks() {
            if let Some(conn) = task.stage.connection() {
                lanes
                    .entry(conn.name.clone())
                    .or_insert_with(|| Arc::new(Semaphore::new(WorkerConnection::CAPACITY)));
            }
        }

        let mut first_error: Option<TaskFailure> = None;
        let mut running: JoinSet<(TaskId, Result<StageOutcome>)> = JoinSet::new();

        info!(tasks = order.len(), "iniciando corrida");

        loop {
            // despachar todo lo que esté listo (y propagar los saltos)
            let mut progressed = true;
            while progressed {
                progressed = false;
                for id in &order {
                    if status.get(id) != Some(&TaskStatus::Pending) {
                        continue;
                    }
                    let Some(task) = graph.task(id) else { continue };

                    let deps: Vec<TaskStatus> = task
                        .inputs
                        .iter()
                        .map(|d| status.get(d).copied().unwrap_or(TaskStatus::Pending))
                        .collect();

                    let blocked = deps
                        .iter()
                        .any(|s| matches!(s, TaskStatus::Failed | TaskStatus::Skipped));
                    if blocked || cancel.is_cancelled() {
                        warn!(task = %id, "predecesor fallido o corrida cancelada, se saltea");
                        status.insert(id.clone(), TaskStatus::Skipped);
                        self.board.mark_skipped(id);
                        progressed = true;
                        continue;
                    }

                    if deps.iter().all(|s| *s == TaskStatus::Succeeded) {
                        status.insert(id.clone(), TaskStatus::Running);
                        let lane = task
                            .stage
                            .connection()
                            .and_then(|c| lanes.get(&c.name).cloned());
                        running.spawn(self.launch(task.clone(), global.clone(), lane, cancel.clone()));
                        progressed = true;
                    }
                }
            }

            let Some(joined) = running.join_next().await else {
                break;
            };

            let (id, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    // launch() no entra en pánico; la tarea queda Running y
                    // se resuelve al final con settle_orphans
                    error!(error = %e, "tarea del orquestador abortada");
                    continue;
                }
            };

            match result {
                Ok(outcome) => {
                    info!(task = %id, ?outcome, "tarea terminada");
                    status.insert(id.clone(), TaskStatus::Succeeded);
                    self.board
                        .mark_succeeded(&id, outcome == StageOutcome::AlreadyDone);
                }
                Err(e) => {
                    error!(task = %id, kind = e.kind(), error = %e, "tarea fallida");
                    if first_error.is_none() {
                        first_error = Some(TaskFailure::from_error(&id, &e));
                    }
                    status.insert(id.clone(), TaskStatus::Failed);
                    self.board.mark_failed(&id, &e);
                }
            }
        }

        self.settle_orphans(&order, &mut status, &mut first_error);

        let all_ok = status.values().all(|s| *s == TaskStatus::Succeeded);
        let run_status = if all_ok {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };
        self.board.finish_run(run_status);

        info!(status = ?run_status, "corrida terminada");
        Ok(RunOutcome {
            status: run_status,
            tasks: order
                .iter()
                .map(|id| (id.clone(), status.get(id).copied().unwrap_or(TaskStatus::Pending)))
                .collect(),
            first_error,
        })
    }

    /// Cierra lo que quedó sin resultado: una tarea todavía Running perdió
    /// su resultado y pasa a Failed; lo que quedó Pending dependía de algo
    /// que no terminó bien y pasa a Skipped.
    fn settle_orphans(
        &self,
        order: &[TaskId],
        status: &mut HashMap<TaskId, TaskStatus>,
        first_error: &mut Option<TaskFailure>,
    ) {
        for id in order {
            match status.get(id) {
                Some(TaskStatus::Running) => {
                    let err = Error::Panicked {
                        task: id.clone(),
                        message: "la tarea terminó sin devolver resultado".into(),
                    };
                    error!(task = %id, "tarea sin resultado, se marca fallida");
                    if first_error.is_none() {
                        *first_error = Some(TaskFailure::from_error(id, &err));
                    }
                    status.insert(id.clone(), TaskStatus::Failed);
                    self.board.mark_failed(id, &err);
                }
                Some(TaskStatus::Pending) => {
                    warn!(task = %id, "predecesor sin resultado, se saltea");
                    status.insert(id.clone(), TaskStatus::Skipped);
                    self.board.mark_skipped(id);
                }
                _ => {}
            }
        }
    }

    fn launch(
        &self,
        task: Task,
        global: Arc<Semaphore>,
        lane: Option<Arc<Semaphore>>,
        cancel: CancellationToken,
    ) -> impl std::future::Future<Output = (TaskId, Result<StageOutcome>)> + Send + 'static {
        let executor = self.executor.clone();
        let board = self.board.clone();

        async move {
            // primero la conexión, después el cupo global
            let _lane = match lane {
                Some(s) => s.acquire_owned().await.ok(),
                None => None,
            };
            let _slot = global.acquire_owned().await.ok();

            let id = task.id.clone();
            board.mark_running(&id);
            info!(task = %id, stage = task.stage.label(), "tarea en curso");

            let inner = tokio::spawn(async move { executor.execute(&task, &cancel).await });
            let result = match inner.await {
                Ok(r) => r,
                Err(e) => Err(Error::Panicked {
                    task: id.clone(),
                    message: e.to_string(),
                }),
            };
            (id, result)
        }
    }
}
