//! gen3d - Image/text to textured 3D mesh worker
//!
//! gen3d is a thin serving layer around external 3D generation models,
//! providing an HTTP API and a serverless job handler on top of them.
//!
//! # Architecture
//!
//! - **pipeline**: trait seams for the models (background removal,
//!   text-to-image, shape generation, mesh cleanup, texture painting) and the
//!   helper-process bridge that hosts them
//! - **engine**: the model worker that sequences one request through the
//!   pipelines, bounded by a concurrency limiter
//! - **server**: axum routes over the worker
//! - **job**: replays serverless job documents against the router in-process
//!
//! # Example
//!
//! ```bash
//! # Start server
//! gen3d serve --model-path tencent/Hunyuan3D-2 --port 8081
//!
//! # Run a single job
//! echo '{"input": {"api": {"endpoint": "/test"}}}' | gen3d job
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod server;

// Re-export key types
pub use config::{Gen3dConfig, GenerationConfig, ServerConfig, WorkerConfig};
pub use engine::{GenerateRequest, ModelWorker};
pub use error::{Error, Result};
pub use pipeline::{Mesh, Pipelines, PythonBridge};
