//! Configuration system for gen3d
//!
//! Gen3dConfig groups the HTTP server, model worker and generation
//! defaults. It can be loaded from YAML or JSON; CLI flags override it.

mod generation;
mod server;
mod worker;

pub use generation::GenerationConfig;
pub use server::ServerConfig;
pub use worker::{BridgeConfig, DeviceConfig, WorkerConfig};

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Gen3dConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Model worker settings
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Defaults for generation parameters
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl Gen3dConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration, picking the format from the file extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(path),
            Some("json") => Self::from_json(path),
            other => Err(anyhow!(
                "unsupported config format: {:?} (expected .yaml, .yml or .json)",
                other
            )),
        }
        .with_context(|| format!("Failed to load config from {}", path.display()))
    }
}
