//! Pipeline builder with validation.

use super::Pipeline;
use crate::errors::PipelineValidationError;
use crate::events::{EventSink, LoggingEventSink};
use crate::stages::Stage;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating validated linear pipelines.
pub struct PipelineBuilder {
    /// The pipeline name.
    name: String,
    /// Stages in execution order.
    stages: Vec<Arc<dyn Stage>>,
    /// Names already taken.
    names: HashSet<String>,
    event_sink: Option<Arc<dyn EventSink>>,
    stage_timeout: Option<Duration>,
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .field("stage_timeout", &self.stage_timeout)
            .finish_non_exhaustive()
    }
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            names: HashSet::new(),
            event_sink: None,
            stage_timeout: None,
        }
    }

    /// Appends a stage. Stages run in the order they are added.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage with the same name was already added.
    pub fn stage(mut self, stage: Arc<dyn Stage>) -> Result<Self, PipelineValidationError> {
        let name = stage.name().to_string();
        if name.trim().is_empty() {
            return Err(PipelineValidationError::new("Stage name must not be empty"));
        }
        if !self.names.insert(name.clone()) {
            return Err(
                PipelineValidationError::new(format!("Duplicate stage name '{name}'"))
                    .with_stages(vec![name]),
            );
        }
        self.stages.push(stage);
        Ok(self)
    }

    /// Sets the sink that receives lifecycle events.
    ///
    /// Defaults to a [`LoggingEventSink`].
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Sets a deadline applied to every stage.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the builder has no stages.
    pub fn build(self) -> Result<Pipeline, PipelineValidationError> {
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new(format!(
                "Pipeline '{}' has no stages",
                self.name
            )));
        }

        let sink = self
            .event_sink
            .unwrap_or_else(|| Arc::new(LoggingEventSink::default()));
        Ok(Pipeline::new(self.name, self.stages, sink, self.stage_timeout))
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}
