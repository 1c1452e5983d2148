//! Route definitions

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{generate, health, send, status, test_endpoint, worker_status, AppState};

/// Create the API router
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Probes
        .route("/test", get(test_endpoint))
        .route("/health", get(health))
        .route("/worker_status", get(worker_status))
        // Generation
        .route("/generate", post(generate))
        .route("/send", post(send))
        .route("/status/:uid", get(status))
}
