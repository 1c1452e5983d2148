//! Model pipelines used by the worker
//!
//! The actual models (background removal, text-to-image, shape generation,
//! mesh cleanup, texture painting) live outside this crate. Each one is a
//! trait here so the worker can sequence them without knowing where they run:
//! - `PythonBridge`: forwards every call to a helper process hosting the models
//! - test fakes: in-process implementations used by the unit tests

mod bridge;
mod imaging;
mod mesh;

#[cfg(test)]
pub(crate) mod fake;

pub use imaging::{decode_base64_image, encode_png_base64};
pub use bridge::{BridgeRequest, BridgeResponse, PythonBridge};
pub use mesh::{Mesh, MeshStats};

#[cfg(test)]
pub(crate) use mesh::{empty_glb, glb_from_json};

use std::sync::Arc;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::error::Result;

/// Parameters forwarded to the shape generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeParams {
    pub seed: u64,
    pub octree_resolution: u32,
    pub num_inference_steps: u32,
    pub guidance_scale: f32,
    pub mc_algo: String,
}

impl From<&GenerationConfig> for ShapeParams {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            seed: config.seed,
            octree_resolution: config.octree_resolution,
            num_inference_steps: config.num_inference_steps,
            guidance_scale: config.guidance_scale,
            mc_algo: config.mc_algo.clone(),
        }
    }
}

/// Removes the background of the conditioning image
pub trait BackgroundRemover: Send + Sync {
    fn remove_background(&self, image: DynamicImage) -> Result<DynamicImage>;
}

/// Renders a conditioning image from a text prompt
pub trait TextToImage: Send + Sync {
    fn text_to_image(&self, prompt: &str) -> Result<DynamicImage>;
}

/// Generates an untextured mesh from a conditioning image
pub trait ShapeGenerator: Send + Sync {
    fn generate_shape(&self, image: &DynamicImage, params: &ShapeParams) -> Result<Mesh>;
}

/// Mesh cleanup applied before texturing
pub trait MeshPostprocessor: Send + Sync {
    /// Drop small disconnected components
    fn remove_floaters(&self, mesh: Mesh) -> Result<Mesh>;

    /// Drop zero-area faces
    fn remove_degenerate_faces(&self, mesh: Mesh) -> Result<Mesh>;

    /// Decimate down to at most `max_faces` faces
    fn reduce_faces(&self, mesh: Mesh, max_faces: usize) -> Result<Mesh>;
}

/// Paints a texture onto a mesh using the conditioning image
pub trait TexturePainter: Send + Sync {
    fn paint(&self, mesh: Mesh, image: &DynamicImage) -> Result<Mesh>;
}

/// Releases cached accelerator memory between requests
pub trait DeviceCache: Send + Sync {
    fn empty_cache(&self) -> Result<()>;
}

/// Loaded model handles, one per pipeline stage
#[derive(Clone)]
pub struct Pipelines {
    pub rembg: Arc<dyn BackgroundRemover>,
    pub text_to_image: Arc<dyn TextToImage>,
    pub shape: Arc<dyn ShapeGenerator>,
    pub postprocess: Arc<dyn MeshPostprocessor>,
    pub texture: Arc<dyn TexturePainter>,
    pub cache: Arc<dyn DeviceCache>,
}

impl Pipelines {
    /// Route every stage through the helper process
    pub fn from_bridge(bridge: Arc<PythonBridge>) -> Self {
        Self {
            rembg: bridge.clone(),
            text_to_image: bridge.clone(),
            shape: bridge.clone(),
            postprocess: bridge.clone(),
            texture: bridge.clone(),
            cache: bridge,
        }
    }
}
