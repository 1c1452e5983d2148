//! HTTP request handlers

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Json, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::error::{ApiError, SERVER_ERROR_MSG};
use crate::engine::{GenerateRequest, ModelWorker, TaskStatus, TaskStore, WorkerStatus};

/// Shared application state
pub struct AppState {
    pub worker: Arc<ModelWorker>,
    pub tasks: TaskStore,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(worker: Arc<ModelWorker>, request_timeout: Duration, task_ttl: Duration) -> Self {
        Self {
            worker,
            tasks: TaskStore::new(task_ttl),
            request_timeout,
        }
    }
}

/// Liveness probe used by the job runtime
pub async fn test_endpoint() -> Json<Value> {
    Json(json!({ "message": "test" }))
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Current load of the worker
pub async fn worker_status(State(state): State<Arc<AppState>>) -> Json<WorkerStatus> {
    Json(state.worker.get_status())
}

/// Generate a mesh and return it as a GLB file
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> Result<Response, ApiError> {
    let uid = Uuid::new_v4();
    tracing::info!("[{}] generate request (queue={})", uid, state.worker.get_queue_length());

    let (path, _) = tokio::time::timeout(
        state.request_timeout,
        state.worker.generate_async(uid, request),
    )
    .await
    .map_err(|_| {
        ApiError::timeout(format!(
            "generation did not finish within {}s",
            state.request_timeout.as_secs()
        ))
    })??;

    let bytes = read_output(&path).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "model/gltf-binary".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.glb\"", uid),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn read_output(path: &std::path::Path) -> Result<Vec<u8>, ApiError> {
    tokio::fs::read(path).await.map_err(|e| {
        tracing::error!("failed to read {}: {}", path.display(), e);
        ApiError::internal(SERVER_ERROR_MSG)
    })
}

#[derive(Serialize)]
pub struct SendResponse {
    pub uid: Uuid,
}

/// Start a generation in the background; poll `/status/{uid}` for the result
pub async fn send(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> Json<SendResponse> {
    let uid = Uuid::new_v4();
    state.tasks.insert(uid).await;
    tracing::info!("[{}] queued background generation", uid);

    let task_state = Arc::clone(&state);
    tokio::spawn(async move {
        match task_state.worker.generate_async(uid, request).await {
            Ok((path, _)) => task_state.tasks.complete(uid, path).await,
            Err(e) => {
                tracing::error!("[{}] background generation failed: {}", uid, e);
                let message = if e.is_client_error() {
                    e.to_string()
                } else {
                    SERVER_ERROR_MSG.to_string()
                };
                task_state.tasks.fail(uid, message).await;
            }
        }
    });

    Json(SendResponse { uid })
}

/// Poll a background generation
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let uid = Uuid::parse_str(&uid)
        .map_err(|_| ApiError::bad_request(format!("invalid uid: {}", uid)))?;

    let status = match state.tasks.get(&uid).await {
        Some(record) => record.status,
        // Outputs left by an earlier run are still served.
        None => {
            let path = state.worker.output_path(&uid);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                TaskStatus::Completed { path }
            } else {
                return Err(ApiError::not_found(format!("unknown uid: {}", uid)));
            }
        }
    };

    match status {
        TaskStatus::Processing => Ok(Json(json!({ "status": "processing" }))),
        TaskStatus::Completed { path } => {
            let bytes = read_output(&path).await?;
            Ok(Json(json!({
                "status": "completed",
                "model_base64": STANDARD.encode(bytes),
            })))
        }
        TaskStatus::Failed { error } => Ok(Json(json!({
            "status": "error",
            "message": error,
        }))),
    }
}
