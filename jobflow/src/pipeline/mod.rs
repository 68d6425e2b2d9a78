//! Pipeline building and execution.
//!
//! This module provides:
//! - A builder that validates a linear list of stages
//! - The merge-or-halt engine with panic, timeout and cancellation guards
//! - Retry with backoff for collaborator calls
//! - A run manager that enforces one run per workspace

mod builder;
mod engine;
mod factory;
mod retry;
mod runner;


pub use builder::PipelineBuilder;
pub use engine::{Pipeline, PipelineRun, RunOptions, StageRecord, StatusCallback};
pub use factory::{application_pipeline, Collaborators, APPLICATION_PIPELINE};
pub use retry::{with_retry, RetryPolicy};
pub use runner::{RunHandle, RunManager};
