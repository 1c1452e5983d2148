//! Core generation engine
//!
//! This module provides the request pipeline around the models:
//! - ModelWorker: Holds the loaded pipelines and runs one generation
//! - ConcurrencyLimiter: Bounds how many generations run at once
//! - TaskStore: Tracks generations started in the background

mod limiter;
mod tasks;
mod worker;

pub use limiter::ConcurrencyLimiter;
pub use tasks::{TaskRecord, TaskStatus, TaskStore};
pub use worker::{worker_id, GenerateRequest, ModelWorker, WorkerStatus};
