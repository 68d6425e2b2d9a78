//! Lifecycle events emitted by the pipeline engine.
//!
//! Events are stringly typed (`"stage.started"`, ...) with an optional JSON
//! payload so sinks can forward them without knowing the engine's types.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event names emitted by [`Pipeline`](crate::pipeline::Pipeline).
pub mod types {
    /// A run started.
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    /// Every stage completed.
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
    /// A stage failed and the run stopped.
    pub const PIPELINE_FAILED: &str = "pipeline.failed";
    /// A stage is about to execute.
    pub const STAGE_STARTED: &str = "stage.started";
    /// A stage's update was merged.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// A stage returned an error, panicked or timed out.
    pub const STAGE_FAILED: &str = "stage.failed";
}
