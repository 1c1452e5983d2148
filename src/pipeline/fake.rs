//! In-process pipeline stand-ins for tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::{DynamicImage, RgbaImage};

use super::{
    empty_glb, BackgroundRemover, DeviceCache, Mesh, MeshPostprocessor, Pipelines,
    ShapeGenerator, ShapeParams, TextToImage, TexturePainter,
};
use crate::error::{Error, Result};

/// Records every stage it is asked to run
#[derive(Default)]
pub struct FakeModels {
    calls: Mutex<Vec<String>>,
    fail_shape: bool,
    shape_delay: Option<Duration>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl FakeModels {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Models whose shape generator always fails
    pub fn failing_shape() -> Arc<Self> {
        Arc::new(Self {
            fail_shape: true,
            ..Default::default()
        })
    }

    /// Models whose shape generator blocks for `delay`
    pub fn slow_shape(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            shape_delay: Some(delay),
            ..Default::default()
        })
    }

    /// Shape generations in flight right now
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Most shape generations ever in flight at once
    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn pipelines(self: &Arc<Self>) -> Pipelines {
        Pipelines {
            rembg: self.clone(),
            text_to_image: self.clone(),
            shape: self.clone(),
            postprocess: self.clone(),
            texture: self.clone(),
            cache: self.clone(),
        }
    }
}

impl BackgroundRemover for FakeModels {
    fn remove_background(&self, image: DynamicImage) -> Result<DynamicImage> {
        self.record(format!("remove_background({}x{})", image.width(), image.height()));
        Ok(image)
    }
}

impl TextToImage for FakeModels {
    fn text_to_image(&self, prompt: &str) -> Result<DynamicImage> {
        self.record(format!("text_to_image({})", prompt));
        Ok(DynamicImage::ImageRgba8(RgbaImage::new(8, 8)))
    }
}

impl ShapeGenerator for FakeModels {
    fn generate_shape(&self, _image: &DynamicImage, params: &ShapeParams) -> Result<Mesh> {
        self.record(format!(
            "generate_shape(seed={}, octree={}, steps={}, guidance={}, {})",
            params.seed,
            params.octree_resolution,
            params.num_inference_steps,
            params.guidance_scale,
            params.mc_algo
        ));
        if self.fail_shape {
            return Err(Error::pipeline("shape generation", "CUDA out of memory"));
        }
        if let Some(delay) = self.shape_delay {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(delay);
            self.running.fetch_sub(1, Ordering::SeqCst);
        }
        Mesh::from_glb(empty_glb())
    }
}

impl MeshPostprocessor for FakeModels {
    fn remove_floaters(&self, mesh: Mesh) -> Result<Mesh> {
        self.record("remove_floaters".to_string());
        Ok(mesh)
    }

    fn remove_degenerate_faces(&self, mesh: Mesh) -> Result<Mesh> {
        self.record("remove_degenerate_faces".to_string());
        Ok(mesh)
    }

    fn reduce_faces(&self, mesh: Mesh, max_faces: usize) -> Result<Mesh> {
        self.record(format!("reduce_faces({})", max_faces));
        Ok(mesh)
    }
}

impl TexturePainter for FakeModels {
    fn paint(&self, mesh: Mesh, image: &DynamicImage) -> Result<Mesh> {
        self.record(format!("paint({}x{})", image.width(), image.height()));
        Ok(mesh)
    }
}

impl DeviceCache for FakeModels {
    fn empty_cache(&self) -> Result<()> {
        self.record("empty_cache".to_string());
        Ok(())
    }
}
