//! Model worker
//!
//! Holds the loaded pipelines and turns one generation request into a GLB
//! file on disk.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ConcurrencyLimiter;
use crate::config::{GenerationConfig, WorkerConfig};
use crate::error::{Error, Result};
use crate::pipeline::{decode_base64_image, Mesh, Pipelines, ShapeParams};

/// Short identifier of this worker process, stable for its lifetime
pub fn worker_id() -> &'static str {
    static WORKER_ID: OnceLock<String> = OnceLock::new();
    WORKER_ID.get_or_init(|| Uuid::new_v4().to_string()[..6].to_string())
}

/// Generation request payload
///
/// At least one of `image` (base64 PNG/JPEG) or `text` is required; `image`
/// wins when both are present. A base64 GLB in `mesh` skips shape generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub mesh: Option<String>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub octree_resolution: Option<u32>,
    #[serde(default)]
    pub num_inference_steps: Option<u32>,
    #[serde(default)]
    pub guidance_scale: Option<f32>,
    /// Clean up and paint the mesh
    #[serde(default)]
    pub texture: bool,
    /// Face budget applied before texturing
    #[serde(default)]
    pub face_count: Option<usize>,
}

impl GenerateRequest {
    /// Shape parameters with unset fields taken from `defaults`
    pub fn shape_params(&self, defaults: &GenerationConfig) -> ShapeParams {
        ShapeParams {
            seed: self.seed.unwrap_or(defaults.seed),
            octree_resolution: self.octree_resolution.unwrap_or(defaults.octree_resolution),
            num_inference_steps: self
                .num_inference_steps
                .unwrap_or(defaults.num_inference_steps),
            guidance_scale: self.guidance_scale.unwrap_or(defaults.guidance_scale),
            mc_algo: defaults.mc_algo.clone(),
        }
    }
}

/// Load report returned by the status endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub speed: u32,
    pub queue_length: usize,
}

/// Holder of the loaded pipelines
pub struct ModelWorker {
    worker_id: String,
    model_path: String,
    device: String,
    save_dir: PathBuf,
    defaults: GenerationConfig,
    pipelines: Pipelines,
    limiter: ConcurrencyLimiter,
}

impl ModelWorker {
    /// Create a worker; `limit` bounds how many generations run at once
    pub fn new(
        config: &WorkerConfig,
        defaults: GenerationConfig,
        pipelines: Pipelines,
        limit: usize,
    ) -> Result<Self> {
        let worker_id = worker_id().to_string();
        tracing::info!(
            "Loading the model {} on worker {} ...",
            config.model_path,
            worker_id
        );

        std::fs::create_dir_all(&config.save_dir)?;

        Ok(Self {
            worker_id,
            model_path: config.model_path.clone(),
            device: config.device.as_torch_str(),
            save_dir: config.save_dir.clone(),
            defaults,
            pipelines,
            limiter: ConcurrencyLimiter::new(limit),
        })
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Generations running plus generations waiting for a slot
    pub fn get_queue_length(&self) -> usize {
        self.limiter.queue_length()
    }

    pub fn get_status(&self) -> WorkerStatus {
        WorkerStatus {
            speed: 1,
            queue_length: self.get_queue_length(),
        }
    }

    /// Where the mesh for `uid` is written
    pub fn output_path(&self, uid: &Uuid) -> PathBuf {
        self.save_dir.join(format!("{}.glb", uid))
    }

    /// Run the full pipeline for one request (blocking)
    ///
    /// Image (decoded or rendered from text) → background removal → shape
    /// generation unless a mesh was supplied → optional cleanup and texture →
    /// `save_dir/{uid}.glb`.
    pub fn generate(&self, uid: Uuid, request: GenerateRequest) -> Result<(PathBuf, Uuid)> {
        let start = Instant::now();

        let image = match (&request.image, &request.text) {
            (Some(data), _) => decode_base64_image(data)?,
            (None, Some(text)) => {
                tracing::info!("[{}] rendering conditioning image from text", uid);
                self.pipelines.text_to_image.text_to_image(text)?
            }
            (None, None) => return Err(Error::MissingInput),
        };
        let image = self.pipelines.rembg.remove_background(image)?;

        let mut mesh = match &request.mesh {
            Some(data) => Mesh::from_base64(data)?,
            None => {
                let params = request.shape_params(&self.defaults);
                tracing::info!(
                    "[{}] generating shape (seed={}, octree_resolution={}, steps={})",
                    uid,
                    params.seed,
                    params.octree_resolution,
                    params.num_inference_steps
                );
                self.pipelines.shape.generate_shape(&image, &params)?
            }
        };
        tracing::debug!("[{}] shape: {}", uid, mesh.stats());

        if request.texture {
            let max_faces = request.face_count.unwrap_or(self.defaults.face_count);
            let post = &self.pipelines.postprocess;
            mesh = post.remove_floaters(mesh)?;
            mesh = post.remove_degenerate_faces(mesh)?;
            mesh = post.reduce_faces(mesh, max_faces)?;
            mesh = self.pipelines.texture.paint(mesh, &image)?;
            tracing::debug!("[{}] textured: {}", uid, mesh.stats());
        }

        // Round-trip through a scratch file so only loadable meshes get persisted.
        let scratch = tempfile::Builder::new().suffix(".glb").tempfile()?;
        mesh.export(scratch.path())?;
        let mesh = Mesh::load(scratch.path())?;
        scratch.close()?;

        let save_path = self.output_path(&uid);
        mesh.export(&save_path)?;

        if let Err(e) = self.pipelines.cache.empty_cache() {
            tracing::warn!("[{}] failed to release device cache: {}", uid, e);
        }

        tracing::info!(
            "[{}] saved {} ({}) in {:.2?}",
            uid,
            save_path.display(),
            mesh.stats(),
            start.elapsed()
        );
        Ok((save_path, uid))
    }

    /// Wait for a slot, then run `generate` on the blocking pool
    pub async fn generate_async(
        self: &Arc<Self>,
        uid: Uuid,
        request: GenerateRequest,
    ) -> Result<(PathBuf, Uuid)> {
        let permit = self.limiter.acquire().await?;
        tracing::debug!("[{}] acquired slot: {}", uid, self.limiter);

        // The slot stays taken until the blocking job ends, even if the
        // caller stops waiting for it.
        let worker = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            worker.generate(uid, request)
        })
        .await
            .map_err(|e| Error::pipeline("generation", e.to_string()))?
    }
}
