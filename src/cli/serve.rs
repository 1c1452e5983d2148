//! HTTP server command

use std::sync::Arc;

use anyhow::{Context, Result};

use super::{build_state, WorkerArgs};
use crate::server;

/// Load the models and start the HTTP server
pub async fn serve(host: Option<String>, port: Option<u16>, worker: WorkerArgs) -> Result<()> {
    let mut config = worker.resolve()?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    tracing::info!("args: {:?}", config);

    let (bridge, state) = build_state(&config)?;

    // Load the models before accepting traffic.
    let loader = Arc::clone(&bridge);
    tokio::task::spawn_blocking(move || loader.ensure_running())
        .await?
        .context("Failed to load models")?;
    tracing::info!(
        "Worker {} ready: {} on {} (limit {})",
        state.worker.worker_id(),
        state.worker.model_path(),
        state.worker.device(),
        state.worker.limiter().limit()
    );

    let result = server::start(Arc::clone(&state), config.server).await;

    state.worker.limiter().close();
    tokio::task::spawn_blocking(move || bridge.shutdown()).await??;

    result
}
