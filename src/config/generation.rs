//! Generation defaults applied to requests that omit a parameter

use serde::{Deserialize, Serialize};

/// Default shape generation and post-processing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Random seed for the shape generator
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Resolution of the octree the surface is extracted from
    #[serde(default = "default_octree_resolution")]
    pub octree_resolution: u32,

    /// Number of denoising steps
    #[serde(default = "default_num_inference_steps")]
    pub num_inference_steps: u32,

    /// Classifier-free guidance scale
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f32,

    /// Face budget for meshes that get textured
    #[serde(default = "default_face_count")]
    pub face_count: usize,

    /// Surface extraction algorithm
    #[serde(default = "default_mc_algo")]
    pub mc_algo: String,
}

fn default_seed() -> u64 {
    1234
}

fn default_octree_resolution() -> u32 {
    256
}

fn default_num_inference_steps() -> u32 {
    30
}

fn default_guidance_scale() -> f32 {
    7.5
}

fn default_face_count() -> usize {
    40000
}

fn default_mc_algo() -> String {
    "mc".to_string()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            octree_resolution: default_octree_resolution(),
            num_inference_steps: default_num_inference_steps(),
            guidance_scale: default_guidance_scale(),
            face_count: default_face_count(),
            mc_algo: default_mc_algo(),
        }
    }
}
