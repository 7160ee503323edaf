use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use common::status::{RunInfo, TaskInfo};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/run", get(get_run))
        .route("/api/v1/tasks", get(list_tasks))
        .route("/api/v1/tasks/:id", get(get_task))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

// Resumen de la corrida: estado, conteos y primer error
async fn get_run(State(state): State<AppState>) -> Json<RunInfo> {
    Json(state.board.run_info())
}

// Todas las tareas, en el orden del grafo
async fn list_tasks(State(state): State<AppState>) -> Json<Vec<TaskInfo>> {
    Json(state.board.tasks())
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskInfo>, StatusCode> {
    match state.board.task(&id) {
        Some(task) => Ok(Json(task)),
        None => {
            debug!("tarea {} no encontrada", id);
            Err(StatusCode::NOT_FOUND)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use common::status::{RunBoard, RunStatus};
    use common::task::{StageKind, Task, TaskStatus};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<RunBoard>) {
        let board = Arc::new(RunBoard::new("2024-01-10-2024-01-17"));
        board.start_run(&[
            Task::new("project_init", StageKind::Init, vec![]),
            Task::new("generate_report", StageKind::Report, vec!["project_init".into()]),
        ]);
        board.mark_running("project_init");
        board.mark_succeeded("project_init", false);
        (build_router(AppState::new(board.clone())), board)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let res = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn run_muestra_conteos() {
        let (app, _) = app();
        let (status, body) = get_json(app, "/api/v1/run").await;
        assert_eq!(status, StatusCode::OK);
        let info: RunInfo = serde_json::from_value(body).unwrap();
        assert_eq!(info.status, RunStatus::Running);
        assert_eq!((info.succeeded, info.pending), (1, 1));
    }

    #[tokio::test]
    async fn tareas_en_orden_y_por_id() {
        let (app, _) = app();
        let (_, body) = get_json(app.clone(), "/api/v1/tasks").await;
        let tasks: Vec<TaskInfo> = serde_json::from_value(body).unwrap();
        assert_eq!(tasks[0].id, "project_init");
        assert_eq!(tasks[1].status, TaskStatus::Pending);

        let (status, body) = get_json(app.clone(), "/api/v1/tasks/project_init").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "SUCCEEDED");

        let (status, _) = get_json(app, "/api/v1/tasks/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
