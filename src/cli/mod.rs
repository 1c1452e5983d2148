//! CLI commands
//!
//! `serve` runs the HTTP server; `job` runs a single serverless job through
//! the same router and prints the result.

mod job;
mod serve;

pub use job::job;
pub use serve::serve;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::{DeviceConfig, Gen3dConfig};
use crate::engine::ModelWorker;
use crate::pipeline::{Pipelines, PythonBridge};
use crate::server::AppState;

/// gen3d - Image/text to textured 3D mesh worker
#[derive(Parser)]
#[command(name = "gen3d")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        #[command(flatten)]
        worker: WorkerArgs,
    },

    /// Run one serverless job and print its result
    Job {
        /// Job JSON file ("-" reads stdin)
        #[arg(long, short, default_value = "-")]
        input: PathBuf,

        /// Pretty-print the result
        #[arg(long)]
        pretty: bool,

        #[command(flatten)]
        worker: WorkerArgs,
    },
}

/// Worker settings shared by all commands; flags override the config file
#[derive(Args, Debug, Clone, Default)]
pub struct WorkerArgs {
    /// Configuration file (YAML or JSON)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Shape and texture model repository or local path
    #[arg(long, alias = "model_path")]
    pub model_path: Option<String>,

    /// Device for the models (e.g. "cuda", "cuda:1", "cpu")
    #[arg(long)]
    pub device: Option<DeviceConfig>,

    /// Maximum number of generations running at once
    #[arg(long)]
    pub limit_model_concurrency: Option<usize>,

    /// Directory generated meshes are written to
    #[arg(long)]
    pub save_dir: Option<PathBuf>,

    /// Interpreter for the model helper process
    #[arg(long)]
    pub python: Option<String>,

    /// Script run by the model helper process
    #[arg(long)]
    pub bridge_script: Option<PathBuf>,
}

impl WorkerArgs {
    /// Load the config file (if any) and apply the flags on top
    pub fn resolve(&self) -> Result<Gen3dConfig> {
        let mut config = match &self.config {
            Some(path) => Gen3dConfig::load(path)?,
            None => Gen3dConfig::default(),
        };

        if let Some(model_path) = &self.model_path {
            config.worker.model_path = model_path.clone();
        }
        if let Some(device) = &self.device {
            config.worker.device = *device;
        }
        if let Some(limit) = self.limit_model_concurrency {
            config.server.limit_model_concurrency = limit;
        }
        if let Some(save_dir) = &self.save_dir {
            config.worker.save_dir = save_dir.clone();
        }
        if let Some(python) = &self.python {
            config.worker.bridge.python = python.clone();
        }
        if let Some(script) = &self.bridge_script {
            config.worker.bridge.script = script.clone();
        }

        Ok(config)
    }
}

/// Create the bridge-backed worker and the shared server state
fn build_state(config: &Gen3dConfig) -> Result<(Arc<PythonBridge>, Arc<AppState>)> {
    let bridge = Arc::new(PythonBridge::new(&config.worker));
    let pipelines = Pipelines::from_bridge(Arc::clone(&bridge));

    let worker = ModelWorker::new(
        &config.worker,
        config.generation.clone(),
        pipelines,
        config.server.limit_model_concurrency,
    )
    .with_context(|| {
        format!(
            "Failed to prepare output directory {}",
            config.worker.save_dir.display()
        )
    })?;

    let state = Arc::new(AppState::new(
        Arc::new(worker),
        Duration::from_secs(config.server.request_timeout_secs),
        Duration::from_secs(config.server.task_ttl_secs),
    ));
    Ok((bridge, state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from([
            "gen3d",
            "serve",
            "--port",
            "9001",
            "--model_path",
            "./weights",
            "--limit-model-concurrency",
            "2",
        ])
        .unwrap();

        match cli.command {
            Commands::Serve { host, port, worker } => {
                assert_eq!(host, None);
                assert_eq!(port, Some(9001));
                let config = worker.resolve().unwrap();
                assert_eq!(config.worker.model_path, "./weights");
                assert_eq!(config.server.limit_model_concurrency, 2);
                assert_eq!(config.server.port, 8081);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gen3d.yaml");
        std::fs::write(&path, "worker:\n  device: cuda:1\n  model_path: from-file\n").unwrap();

        let args = WorkerArgs {
            config: Some(path),
            device: Some(DeviceConfig::Cpu),
            ..Default::default()
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.worker.model_path, "from-file");
        assert!(!config.worker.device.is_cuda());
    }

    #[test]
    fn test_device_flag_is_validated() {
        let cli = Cli::try_parse_from(["gen3d", "serve", "--device", "cuda:3"]).unwrap();
        match cli.command {
            Commands::Serve { worker, .. } => {
                assert_eq!(worker.device, Some(DeviceConfig::Cuda(3)))
            }
            _ => panic!("expected serve"),
        }

        assert!(Cli::try_parse_from(["gen3d", "serve", "--device", "tpu"]).is_err());
    }

    #[test]
    fn test_parse_job_defaults() {
        let cli = Cli::try_parse_from(["gen3d", "job"]).unwrap();
        match cli.command {
            Commands::Job { input, pretty, .. } => {
                assert_eq!(input, PathBuf::from("-"));
                assert!(!pretty);
            }
            _ => panic!("expected job"),
        }
    }
}
