//! The context handed to a stage for one invocation.

use super::RunIdentity;
use crate::cancellation::CancellationToken;
use crate::core::PipelineState;
use crate::events::{EventSink, NoOpEventSink};
use serde_json::{json, Value};
use std::sync::Arc;

/// What a stage sees while it executes.
///
/// The state is a snapshot owned by the context. A stage cannot mutate the
/// engine's state; it returns a [`StateUpdate`](crate::core::StateUpdate)
/// instead.
pub struct StageContext {
    state: PipelineState,
    stage_name: String,
    run: RunIdentity,
    event_sink: Arc<dyn EventSink>,
    cancellation: Arc<CancellationToken>,
}

impl StageContext {
    /// Creates a context with a no-op event sink and a fresh token.
    #[must_use]
    pub fn new(state: PipelineState, stage_name: impl Into<String>) -> Self {
        Self {
            state,
            stage_name: stage_name.into(),
            run: RunIdentity::new(),
            event_sink: Arc::new(NoOpEventSink),
            cancellation: Arc::new(CancellationToken::new()),
        }
    }

    /// Sets the run identity.
    #[must_use]
    pub fn with_run(mut self, run: RunIdentity) -> Self {
        self.run = run;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }

    /// The state snapshot.
    #[must_use]
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// The executing stage's name.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// The run identity.
    #[must_use]
    pub fn run(&self) -> &RunIdentity {
        &self.run
    }

    /// Returns whether the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Emits an event tagged with the run and stage.
    ///
    /// Object payloads gain `run_id` and `stage` keys; other payloads are
    /// wrapped under `data`.
    pub fn try_emit_event(&self, event_type: &str, data: Option<Value>) {
        let mut payload = match data {
            Some(Value::Object(map)) => Value::Object(map),
            Some(other) => json!({ "data": other }),
            None => json!({}),
        };
        if let Value::Object(map) = &mut payload {
            map.insert("run_id".into(), json!(self.run.run_id.to_string()));
            map.insert("stage".into(), json!(self.stage_name));
        }
        self.event_sink.try_emit(event_type, Some(payload));
    }
}

impl std::fmt::Debug for StageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageContext")
            .field("stage_name", &self.stage_name)
            .field("run_id", &self.run.run_id)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
