//! Bridge to the helper process hosting the model pipelines
//!
//! The helper is started lazily on first use and kept alive for the life of
//! the worker. It speaks line-delimited JSON: one request object per line on
//! its stdin, one response object per line on its stdout. Images and meshes
//! travel base64 encoded (PNG and GLB). The first request after start is
//! always `load`, which tells the helper which models and device to use.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Mutex, MutexGuard};

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{
    decode_base64_image, encode_png_base64, BackgroundRemover, DeviceCache, Mesh,
    MeshPostprocessor, ShapeGenerator, ShapeParams, TextToImage, TexturePainter,
};
use crate::config::{BridgeConfig, WorkerConfig};
use crate::error::{Error, Result};

/// Request sent to the helper process
#[derive(Debug, Default, Serialize)]
pub struct BridgeRequest {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_to_image_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<ShapeParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_facenum: Option<usize>,
}

impl BridgeRequest {
    pub fn command(command: &str) -> Self {
        Self {
            command: command.to_string(),
            ..Default::default()
        }
    }
}

/// Response read back from the helper process
#[derive(Debug, Default, Deserialize)]
pub struct BridgeResponse {
    #[serde(default)]
    pub image_base64: Option<String>,
    #[serde(default)]
    pub mesh_base64: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl BridgeResponse {
    fn image(self, stage: &'static str) -> Result<DynamicImage> {
        let data = self
            .image_base64
            .ok_or_else(|| Error::pipeline(stage, "response carried no image"))?;
        decode_base64_image(&data)
    }

    fn mesh(self, stage: &'static str) -> Result<Mesh> {
        let data = self
            .mesh_base64
            .ok_or_else(|| Error::pipeline(stage, "response carried no mesh"))?;
        Mesh::from_base64(&data)
    }
}

struct BridgeProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl BridgeProcess {
    /// Send one request line and read one reply line
    ///
    /// Every transport failure is an `Error::Bridge`.
    fn exchange(&mut self, request: &BridgeRequest) -> Result<BridgeResponse> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .and_then(|_| self.stdin.flush())
            .map_err(|e| Error::Bridge(format!("failed to write to helper: {}", e)))?;

        let mut reply = String::new();
        let read = self
            .stdout
            .read_line(&mut reply)
            .map_err(|e| Error::Bridge(format!("failed to read from helper: {}", e)))?;
        if read == 0 {
            return Err(Error::Bridge("helper process closed its output".to_string()));
        }

        serde_json::from_str(reply.trim_end()).map_err(|e| {
            Error::Bridge(format!("garbled reply from helper ({}): {}", e, truncate(&reply)))
        })
    }
}

fn truncate(line: &str) -> &str {
    let line = line.trim_end();
    match line.char_indices().nth(120) {
        Some((end, _)) => &line[..end],
        None => line,
    }
}

/// Model pipelines hosted by a helper process
pub struct PythonBridge {
    config: BridgeConfig,
    model_path: String,
    text_to_image_model: String,
    device: String,
    process: Mutex<Option<BridgeProcess>>,
}

impl PythonBridge {
    /// Create a bridge for the given worker settings (the helper starts on first use)
    pub fn new(worker: &WorkerConfig) -> Self {
        Self {
            config: worker.bridge.clone(),
            model_path: worker.model_path.clone(),
            text_to_image_model: worker.text_to_image_model.clone(),
            device: worker.device.as_torch_str(),
            process: Mutex::new(None),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<BridgeProcess>>> {
        self.process
            .lock()
            .map_err(|_| Error::Bridge("bridge lock poisoned".to_string()))
    }

    fn spawn(&self) -> Result<BridgeProcess> {
        info!(
            "Starting model helper: {} {}",
            self.config.python,
            self.config.script.display()
        );

        let mut child = Command::new(&self.config.python)
            .arg(&self.config.script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::Bridge(format!("failed to start helper: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Bridge("helper stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Bridge("helper stdout unavailable".to_string()))?;

        let mut process = BridgeProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        };

        let load = BridgeRequest {
            model_path: Some(self.model_path.clone()),
            text_to_image_model: Some(self.text_to_image_model.clone()),
            device: Some(self.device.clone()),
            ..BridgeRequest::command("load")
        };
        let response = match process.exchange(&load) {
            Ok(response) => response,
            Err(e) => {
                let _ = process.child.kill();
                let _ = process.child.wait();
                return Err(Error::Bridge(format!("helper failed to start: {}", e)));
            }
        };
        if let Some(error) = response.error {
            let _ = process.child.kill();
            let _ = process.child.wait();
            return Err(Error::pipeline("model loading", error));
        }

        info!("Model helper ready ({} on {})", self.model_path, self.device);
        Ok(process)
    }

    /// Start the helper and load the models now instead of on the first request
    pub fn ensure_running(&self) -> Result<()> {
        let mut guard = self.lock()?;
        if guard.is_none() {
            *guard = Some(self.spawn()?);
        }
        Ok(())
    }

    /// Send a request, starting the helper if needed
    pub fn call(&self, stage: &'static str, request: &BridgeRequest) -> Result<BridgeResponse> {
        let mut guard = self.lock()?;
        if guard.is_none() {
            *guard = Some(self.spawn()?);
        }

        debug!("bridge request: {}", request.command);
        let result = match guard.as_mut() {
            Some(process) => process.exchange(request),
            None => Err(Error::Bridge("helper not running".to_string())),
        };

        match result {
            Ok(response) => match response.error {
                Some(error) => Err(Error::pipeline(stage, error)),
                None => Ok(response),
            },
            Err(e) => {
                // A broken pipe or garbled reply leaves the helper unusable.
                warn!("Model helper failed during {}: {}", stage, e);
                if let Some(mut process) = guard.take() {
                    let _ = process.child.kill();
                    let _ = process.child.wait();
                }
                Err(e)
            }
        }
    }

    /// Ask the helper to exit and reap it
    pub fn shutdown(&self) -> Result<()> {
        let mut guard = self.lock()?;
        if let Some(mut process) = guard.take() {
            info!("Stopping model helper");
            let _ = process.exchange(&BridgeRequest::command("shutdown"));
            if process.child.try_wait()?.is_none() {
                let _ = process.child.kill();
            }
            let _ = process.child.wait();
        }
        Ok(())
    }

    /// Whether the helper process is currently alive
    pub fn is_running(&self) -> bool {
        match self.process.lock() {
            Ok(mut guard) => match guard.as_mut() {
                Some(process) => matches!(process.child.try_wait(), Ok(None)),
                None => false,
            },
            Err(_) => false,
        }
    }
}

impl Drop for PythonBridge {
    fn drop(&mut self) {
        if let Ok(guard) = self.process.get_mut() {
            if let Some(process) = guard.as_mut() {
                let _ = process.child.kill();
                let _ = process.child.wait();
            }
        }
    }
}

impl BackgroundRemover for PythonBridge {
    fn remove_background(&self, image: DynamicImage) -> Result<DynamicImage> {
        let request = BridgeRequest {
            image_base64: Some(encode_png_base64(&image)?),
            ..BridgeRequest::command("remove_background")
        };
        self.call("background removal", &request)?
            .image("background removal")
    }
}

impl TextToImage for PythonBridge {
    fn text_to_image(&self, prompt: &str) -> Result<DynamicImage> {
        let request = BridgeRequest {
            text: Some(prompt.to_string()),
            ..BridgeRequest::command("text_to_image")
        };
        self.call("text to image", &request)?.image("text to image")
    }
}

impl ShapeGenerator for PythonBridge {
    fn generate_shape(&self, image: &DynamicImage, params: &ShapeParams) -> Result<Mesh> {
        let request = BridgeRequest {
            image_base64: Some(encode_png_base64(image)?),
            params: Some(params.clone()),
            ..BridgeRequest::command("generate_shape")
        };
        self.call("shape generation", &request)?
            .mesh("shape generation")
    }
}

impl MeshPostprocessor for PythonBridge {
    fn remove_floaters(&self, mesh: Mesh) -> Result<Mesh> {
        let request = BridgeRequest {
            mesh_base64: Some(mesh.to_base64()),
            ..BridgeRequest::command("remove_floaters")
        };
        self.call("floater removal", &request)?
            .mesh("floater removal")
    }

    fn remove_degenerate_faces(&self, mesh: Mesh) -> Result<Mesh> {
        let request = BridgeRequest {
            mesh_base64: Some(mesh.to_base64()),
            ..BridgeRequest::command("remove_degenerate_faces")
        };
        self.call("degenerate face removal", &request)?
            .mesh("degenerate face removal")
    }

    fn reduce_faces(&self, mesh: Mesh, max_faces: usize) -> Result<Mesh> {
        let request = BridgeRequest {
            mesh_base64: Some(mesh.to_base64()),
            max_facenum: Some(max_faces),
            ..BridgeRequest::command("reduce_faces")
        };
        self.call("face reduction", &request)?.mesh("face reduction")
    }
}

impl TexturePainter for PythonBridge {
    fn paint(&self, mesh: Mesh, image: &DynamicImage) -> Result<Mesh> {
        let request = BridgeRequest {
            mesh_base64: Some(mesh.to_base64()),
            image_base64: Some(encode_png_base64(image)?),
            ..BridgeRequest::command("paint_texture")
        };
        self.call("texture painting", &request)?
            .mesh("texture painting")
    }
}

impl DeviceCache for PythonBridge {
    fn empty_cache(&self) -> Result<()> {
        self.call("cache release", &BridgeRequest::command("empty_cache"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::empty_glb;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use std::path::Path;

    /// Bridge running a shell script as the helper
    fn script_bridge(dir: &Path, script: &str) -> PythonBridge {
        let path = dir.join("helper.sh");
        std::fs::write(&path, script).unwrap();

        let worker = WorkerConfig {
            device: crate::config::DeviceConfig::Cpu,
            bridge: BridgeConfig {
                python: "sh".to_string(),
                script: path,
            },
            ..Default::default()
        };
        PythonBridge::new(&worker)
    }

    #[test]
    fn test_request_skips_empty_fields() {
        let request = BridgeRequest {
            max_facenum: Some(40000),
            ..BridgeRequest::command("reduce_faces")
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"command": "reduce_faces", "max_facenum": 40000})
        );
    }

    #[test]
    fn test_mesh_round_trip_through_helper() {
        let dir = tempfile::tempdir().unwrap();
        let reply = format!(r#"{{"status":"ok","mesh_base64":"{}"}}"#, STANDARD.encode(empty_glb()));
        let bridge = script_bridge(
            dir.path(),
            &format!("while read line; do echo '{}'; done\n", reply),
        );

        let mesh = Mesh::from_glb(empty_glb()).unwrap();
        let reduced = bridge.reduce_faces(mesh, 1000).unwrap();
        assert_eq!(reduced.as_bytes(), empty_glb().as_slice());
        assert!(bridge.is_running());

        bridge.empty_cache().unwrap();
        bridge.shutdown().unwrap();
        assert!(!bridge.is_running());
    }

    #[test]
    fn test_helper_error_is_pipeline_error() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = script_bridge(
            dir.path(),
            concat!(
                "read line; echo '{\"status\":\"ok\"}'\n",
                "while read line; do echo '{\"error\":\"CUDA out of memory\"}'; done\n",
            ),
        );

        let err = bridge.text_to_image("a red chair").unwrap_err();
        match err {
            Error::Pipeline { stage, message } => {
                assert_eq!(stage, "text to image");
                assert_eq!(message, "CUDA out of memory");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // A reported failure keeps the helper alive.
        assert!(bridge.is_running());
    }

    #[test]
    fn test_helper_exit_is_bridge_error() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = script_bridge(dir.path(), "exit 0\n");

        let err = bridge.ensure_running().unwrap_err();
        assert!(matches!(err, Error::Bridge(_)));
        assert!(!bridge.is_running());
    }

    #[test]
    fn test_garbled_reply_is_bridge_error() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = script_bridge(
            dir.path(),
            concat!(
                "read line; echo '{\"status\":\"ok\"}'\n",
                "while read line; do echo 'Traceback (most recent call last):'; done\n",
            ),
        );

        let err = bridge.text_to_image("x").unwrap_err();
        match err {
            Error::Bridge(message) => assert!(message.contains("Traceback")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!bridge.is_running());
    }

    #[test]
    fn test_helper_restarts_after_dying() {
        let dir = tempfile::tempdir().unwrap();
        let reply = format!(
            r#"{{"status":"ok","mesh_base64":"{}"}}"#,
            STANDARD.encode(empty_glb())
        );
        // Answers `load` and one request, then exits.
        let bridge = script_bridge(
            dir.path(),
            &format!(
                "read line; echo '{{\"status\":\"ok\"}}'\nread line; echo '{}'\nexit 0\n",
                reply
            ),
        );

        let mesh = Mesh::from_glb(empty_glb()).unwrap();
        bridge.remove_floaters(mesh.clone()).unwrap();

        let err = bridge.remove_floaters(mesh.clone()).unwrap_err();
        assert!(matches!(err, Error::Bridge(_)));
        assert!(!bridge.is_running());

        let cleaned = bridge.remove_floaters(mesh).unwrap();
        assert_eq!(cleaned.as_bytes(), empty_glb().as_slice());
        assert!(bridge.is_running());
        bridge.shutdown().unwrap();
    }

    #[test]
    fn test_missing_payload() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = script_bridge(
            dir.path(),
            "while read line; do echo '{\"status\":\"ok\"}'; done\n",
        );

        let mesh = Mesh::from_glb(empty_glb()).unwrap();
        let err = bridge.remove_floaters(mesh).unwrap_err();
        assert!(matches!(err, Error::Pipeline { stage: "floater removal", .. }));
    }
}
