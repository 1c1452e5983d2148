//! Server configuration settings

use serde::{Deserialize, Serialize};

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Maximum number of generations running at once
    #[serde(default = "default_limit_model_concurrency")]
    pub limit_model_concurrency: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Maximum request body size in bytes (images and meshes arrive base64 encoded)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Seconds a finished `/send` task stays in memory
    #[serde(default = "default_task_ttl")]
    pub task_ttl_secs: u64,
}

fn default_port() -> u16 {
    8081
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_limit_model_concurrency() -> usize {
    5
}

fn default_timeout() -> u64 {
    300 // 5 minutes
}

fn default_true() -> bool {
    true
}

fn default_max_body_size() -> usize {
    64 * 1024 * 1024 // 64 MB
}

fn default_task_ttl() -> u64 {
    3600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            limit_model_concurrency: default_limit_model_concurrency(),
            request_timeout_secs: default_timeout(),
            cors_enabled: true,
            max_body_size: default_max_body_size(),
            task_ttl_secs: default_task_ttl(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
