//! Single job command

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::Value;

use super::{build_state, WorkerArgs};
use crate::{job as jobs, server};

/// Run one job through the in-process router and print the result
pub async fn job(input: PathBuf, pretty: bool, worker: WorkerArgs) -> Result<()> {
    let config = worker.resolve()?;

    let raw = if input.as_os_str() == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read job from stdin")?;
        raw
    } else {
        std::fs::read_to_string(&input)
            .with_context(|| format!("Failed to read job from {}", input.display()))?
    };
    let job: Value = serde_json::from_str(&raw).context("Job is not valid JSON")?;

    let (bridge, state) = build_state(&config)?;
    let router = server::router(state, &config.server);

    let result = jobs::handle(router, job).await;
    let output = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{}", output);

    tokio::task::spawn_blocking(move || bridge.shutdown()).await??;
    Ok(())
}
