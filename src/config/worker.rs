//! Model worker configuration settings

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Device the model pipelines run on
///
/// Written in config files and on the command line as `cuda`, `cuda:N` or
/// `cpu`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeviceConfig {
    Cuda(usize),
    Cpu,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig::Cuda(0)
    }
}

impl DeviceConfig {
    pub fn device_type(&self) -> &'static str {
        match self {
            DeviceConfig::Cuda(_) => "cuda",
            DeviceConfig::Cpu => "cpu",
        }
    }

    /// GPU ordinal, 0 on CPU
    pub fn device_id(&self) -> usize {
        match self {
            DeviceConfig::Cuda(id) => *id,
            DeviceConfig::Cpu => 0,
        }
    }

    pub fn is_cuda(&self) -> bool {
        matches!(self, DeviceConfig::Cuda(_))
    }

    /// Device string handed to the helper ("cuda:0", "cpu")
    pub fn as_torch_str(&self) -> String {
        self.to_string()
    }
}

impl FromStr for DeviceConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(DeviceConfig::Cpu),
            "cuda" | "gpu" => Ok(DeviceConfig::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|id| id.parse().ok())
                .map(DeviceConfig::Cuda)
                .ok_or_else(|| format!("unknown device '{}' (expected cuda, cuda:N or cpu)", s)),
        }
    }
}

impl TryFrom<String> for DeviceConfig {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DeviceConfig> for String {
    fn from(device: DeviceConfig) -> Self {
        device.to_string()
    }
}

impl fmt::Display for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceConfig::Cuda(id) => write!(f, "cuda:{}", id),
            DeviceConfig::Cpu => f.write_str("cpu"),
        }
    }
}

/// How to launch the helper process that hosts the model pipelines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Interpreter used to run the helper script
    #[serde(default = "default_python")]
    pub python: String,

    /// Path of the helper script
    #[serde(default = "default_script")]
    pub script: PathBuf,
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_script() -> PathBuf {
    PathBuf::from("scripts/hy3d_bridge.py")
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
            script: default_script(),
        }
    }
}

/// Model worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Shape and texture model repository or local path
    #[serde(default = "default_model_path")]
    pub model_path: String,

    /// Text-to-image model used when a request carries only a prompt
    #[serde(default = "default_text_to_image_model")]
    pub text_to_image_model: String,

    /// Device configuration
    #[serde(default)]
    pub device: DeviceConfig,

    /// Directory generated meshes are written to
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,

    /// Helper process settings
    #[serde(default)]
    pub bridge: BridgeConfig,
}

fn default_model_path() -> String {
    "tencent/Hunyuan3D-2".to_string()
}

fn default_text_to_image_model() -> String {
    "Tencent-Hunyuan/HunyuanDiT-v1.1-Diffusers-Distilled".to_string()
}

fn default_save_dir() -> PathBuf {
    std::env::var("GEN3D_SAVE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("gradio_cache"))
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            text_to_image_model: default_text_to_image_model(),
            device: DeviceConfig::default(),
            save_dir: default_save_dir(),
            bridge: BridgeConfig::default(),
        }
    }
}
