//! The merge-or-halt execution engine.

use crate::cancellation::CancellationToken;
use crate::context::{RunIdentity, StageContext};
use crate::core::{PipelineState, RunStatus, StageOutcome};
use crate::errors::{ErrorInfo, ErrorKind};
use crate::events::{types, EventSink};
use crate::stages::{Stage, StageResult};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Observer notified on every status transition of a run.
pub type StatusCallback = Arc<dyn Fn(&RunStatus) + Send + Sync>;

/// Timing and outcome of one executed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    /// The stage name.
    pub name: String,
    /// How the stage ended.
    pub outcome: StageOutcome,
    /// Wall-clock time spent in the stage.
    pub duration: Duration,
}

/// The result of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Identity of the run.
    pub run: RunIdentity,
    /// Final state. Carries `error` if a stage failed.
    pub state: PipelineState,
    /// Terminal status.
    pub status: RunStatus,
    /// One record per executed stage, in order.
    pub records: Vec<StageRecord>,
    /// Total wall-clock time.
    pub duration: Duration,
}

impl PipelineRun {
    /// Returns true if every stage completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, RunStatus::Completed { .. })
    }
}

/// Per-run controls for [`Pipeline::run_with`].
#[derive(Clone, Default)]
pub struct RunOptions {
    run: Option<RunIdentity>,
    cancellation: Option<Arc<CancellationToken>>,
    on_status: Option<StatusCallback>,
}

impl RunOptions {
    /// Creates default options: a fresh identity and token, no observer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a known run identity.
    #[must_use]
    pub fn with_run(mut self, run: RunIdentity) -> Self {
        self.run = Some(run);
        self
    }

    /// Shares a cancellation token with the caller.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Registers a status observer.
    #[must_use]
    pub fn with_status_callback(mut self, callback: StatusCallback) -> Self {
        self.on_status = Some(callback);
        self
    }
}

impl std::fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("run", &self.run)
            .field("cancellation", &self.cancellation)
            .field("on_status", &self.on_status.is_some())
            .finish()
    }
}

/// A validated, strictly linear sequence of stages.
///
/// Each stage sees a snapshot of the state. An `Ok` update is merged and the
/// engine advances; an `Err` is recorded in the state and no later stage
/// runs. Stage failures never surface as `Err` from [`Pipeline::run`].
pub struct Pipeline {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
    event_sink: Arc<dyn EventSink>,
    stage_timeout: Option<Duration>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .field("stage_timeout", &self.stage_timeout)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub(super) fn new(
        name: String,
        stages: Vec<Arc<dyn Stage>>,
        event_sink: Arc<dyn EventSink>,
        stage_timeout: Option<Duration>,
    ) -> Self {
        Self {
            name,
            stages,
            event_sink,
            stage_timeout,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Runs every stage against `state` with default options.
    pub async fn run(&self, state: PipelineState) -> PipelineRun {
        self.run_with(state, RunOptions::new()).await
    }

    /// Runs every stage against `state`.
    pub async fn run_with(&self, mut state: PipelineState, options: RunOptions) -> PipelineRun {
        let run = options.run.unwrap_or_default();
        let token = options
            .cancellation
            .unwrap_or_else(|| Arc::new(CancellationToken::new()));
        let notify = |status: &RunStatus| {
            if let Some(callback) = &options.on_status {
                callback(status);
            }
        };

        let started = Instant::now();
        let mut records = Vec::with_capacity(self.stages.len());

        info!(run_id = %run, pipeline = %self.name, stages = self.stages.len(), "Pipeline started");
        self.event_sink
            .emit(
                types::PIPELINE_STARTED,
                Some(json!({
                    "run_id": run.run_id.to_string(),
                    "pipeline": self.name,
                    "stages": self.stage_names(),
                })),
            )
            .await;

        for stage in &self.stages {
            let name = stage.name().to_string();

            if token.is_cancelled() {
                let reason = token.reason().unwrap_or_else(|| "Run cancelled".to_string());
                warn!(run_id = %run, stage = %name, %reason, "Run cancelled before stage");
                state.fail(ErrorInfo::new(ErrorKind::Cancelled, reason).with_stage(&name));
                break;
            }

            notify(&RunStatus::Running {
                stage: name.clone(),
            });
            self.event_sink
                .emit(
                    types::STAGE_STARTED,
                    Some(json!({ "run_id": run.run_id.to_string(), "stage": name })),
                )
                .await;

            let ctx = StageContext::new(state.clone(), &name)
                .with_run(run.clone())
                .with_event_sink(self.event_sink.clone())
                .with_cancellation(token.clone());

            let stage_start = Instant::now();
            let (outcome, result) = self.execute_stage(stage.as_ref(), &ctx, &token).await;
            let duration = stage_start.elapsed();
            records.push(StageRecord {
                name: name.clone(),
                outcome,
                duration,
            });

            match result {
                Ok(update) => {
                    debug!(stage = %name, fields = ?update.fields(), "Merging stage update");
                    self.event_sink
                        .emit(
                            types::STAGE_COMPLETED,
                            Some(json!({
                                "run_id": run.run_id.to_string(),
                                "stage": name,
                                "fields": update.fields(),
                                "duration_ms": duration_ms(duration),
                            })),
                        )
                        .await;
                    state.apply(update);
                }
                Err(err) if !err.kind.is_terminal() => {
                    warn!(stage = %name, kind = %err.kind, error = %err.message, "Stage reported a partial failure, continuing");
                }
                Err(err) => {
                    let err = if err.stage.is_empty() {
                        err.with_stage(&name)
                    } else {
                        err
                    };
                    self.event_sink
                        .emit(
                            types::STAGE_FAILED,
                            Some(json!({
                                "run_id": run.run_id.to_string(),
                                "stage": name,
                                "kind": err.kind.as_str(),
                                "error": err.message,
                                "outcome": outcome.to_string(),
                                "duration_ms": duration_ms(duration),
                            })),
                        )
                        .await;
                    state.fail(err);
                    break;
                }
            }
        }

        let status = match &state.error {
            Some(err) => RunStatus::Failed {
                reason: err.message.clone(),
            },
            None => RunStatus::Completed {
                output: state.final_output_path.clone(),
            },
        };
        let duration = started.elapsed();

        match &state.error {
            Some(err) => {
                warn!(run_id = %run, stage = %err.stage, kind = %err.kind, reason = %err.message, "Pipeline failed");
                self.event_sink
                    .emit(
                        types::PIPELINE_FAILED,
                        Some(json!({
                            "run_id": run.run_id.to_string(),
                            "stage": err.stage,
                            "kind": err.kind.as_str(),
                            "error": err.message,
                            "duration_ms": duration_ms(duration),
                        })),
                    )
                    .await;
            }
            None => {
                info!(run_id = %run, output = ?state.final_output_path, "Pipeline completed");
                self.event_sink
                    .emit(
                        types::PIPELINE_COMPLETED,
                        Some(json!({
                            "run_id": run.run_id.to_string(),
                            "output": state.final_output_path,
                            "duration_ms": duration_ms(duration),
                        })),
                    )
                    .await;
            }
        }
        notify(&status);

        PipelineRun {
            run,
            state,
            status,
            records,
            duration,
        }
    }

    /// Runs one stage behind a panic guard, the optional deadline and the
    /// cancellation token.
    async fn execute_stage(
        &self,
        stage: &dyn Stage,
        ctx: &StageContext,
        token: &CancellationToken,
    ) -> (StageOutcome, StageResult) {
        let guarded = AssertUnwindSafe(stage.execute(ctx)).catch_unwind();
        let bounded = async {
            match self.stage_timeout {
                Some(limit) => tokio::time::timeout(limit, guarded).await.ok(),
                None => Some(guarded.await),
            }
        };

        tokio::select! {
            biased;
            () = token.cancelled() => {
                let reason = token.reason().unwrap_or_else(|| "Run cancelled".to_string());
                (StageOutcome::Failed, Err(ErrorInfo::new(ErrorKind::Cancelled, reason)))
            }
            finished = bounded => match finished {
                Some(Ok(Ok(update))) => (StageOutcome::Completed, Ok(update)),
                Some(Ok(Err(err))) => (StageOutcome::Failed, Err(err)),
                Some(Err(panic)) => {
                    let message = panic_message(panic.as_ref());
                    warn!(stage = %stage.name(), %message, "Stage panicked");
                    (
                        StageOutcome::Failed,
                        Err(ErrorInfo::collaborator(format!(
                            "Stage '{}' panicked: {message}",
                            stage.name()
                        ))),
                    )
                }
                None => {
                    let limit = self.stage_timeout.unwrap_or_default();
                    (
                        StageOutcome::TimedOut,
                        Err(ErrorInfo::new(
                            ErrorKind::Timeout,
                            format!(
                                "Stage '{}' timed out after {}s",
                                stage.name(),
                                limit.as_secs_f64()
                            ),
                        )),
                    )
                }
            },
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{JobPosting, StateUpdate};
    use crate::events::CollectingEventSink;
    use crate::pipeline::PipelineBuilder;
    use crate::stages::FnStage;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    fn job(link: &str) -> JobPosting {
        JobPosting::new("Analyst", "Acme", link, "")
    }

    fn fn_stage(
        name: &str,
        func: impl Fn(&PipelineState) -> StageResult + Send + Sync + 'static,
    ) -> Arc<dyn Stage> {
        Arc::new(FnStage::new(name, func))
    }

    #[derive(Debug)]
    struct SleepyStage;

    #[async_trait]
    impl Stage for SleepyStage {
        fn name(&self) -> &str {
            "sleepy"
        }

        async fn execute(&self, _ctx: &StageContext) -> StageResult {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(StateUpdate::empty())
        }
    }

    #[derive(Debug)]
    struct PanickingStage;

    #[async_trait]
    impl Stage for PanickingStage {
        fn name(&self) -> &str {
            "panicky"
        }

        async fn execute(&self, _ctx: &StageContext) -> StageResult {
            panic!("renderer exploded");
        }
    }

    #[tokio::test]
    async fn test_updates_are_merged_in_order() {
        let sink = Arc::new(CollectingEventSink::new());
        let pipeline = PipelineBuilder::new("p")
            .with_event_sink(sink.clone())
            .stage(fn_stage("first", |_| Ok(StateUpdate::jobs(vec![job("a")]))))
            .unwrap()
            .stage(fn_stage("second", |state| {
                assert_eq!(state.jobs.len(), 1);
                Ok(StateUpdate::final_output_path("out.pdf"))
            }))
            .unwrap()
            .build()
            .unwrap();

        let result = pipeline.run(PipelineState::default()).await;

        assert!(result.is_success());
        assert_eq!(
            result.status,
            RunStatus::Completed {
                output: Some("out.pdf".into())
            }
        );
        assert_eq!(result.state.jobs, vec![job("a")]);
        assert_eq!(result.records.len(), 2);
        assert_eq!(
            sink.names(),
            vec![
                "pipeline.started",
                "stage.started",
                "stage.completed",
                "stage.started",
                "stage.completed",
                "pipeline.completed",
            ]
        );
    }

    #[tokio::test]
    async fn test_error_halts_and_freezes_state() {
        let later_ran = Arc::new(Mutex::new(false));
        let flag = later_ran.clone();
        let pipeline = PipelineBuilder::new("p")
            .stage(fn_stage("fails", |_| Err(ErrorInfo::no_results("No jobs found"))))
            .unwrap()
            .stage(fn_stage("never", move |_| {
                *flag.lock() = true;
                Ok(StateUpdate::jobs(vec![job("x")]))
            }))
            .unwrap()
            .build()
            .unwrap();

        let result = pipeline.run(PipelineState::default()).await;

        assert!(!*later_ran.lock());
        assert_eq!(
            result.status,
            RunStatus::Failed {
                reason: "No jobs found".into()
            }
        );
        let err = result.state.error.unwrap();
        assert_eq!(err.stage, "fails");
        assert_eq!(err.kind, ErrorKind::NoResults);
        assert!(result.state.jobs.is_empty());
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].outcome, StageOutcome::Failed);
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_halt() {
        let pipeline = PipelineBuilder::new("p")
            .stage(fn_stage("lossy", |_| {
                Err(ErrorInfo::new(ErrorKind::PartialFailure, "one pair failed"))
            }))
            .unwrap()
            .stage(fn_stage("next", |_| Ok(StateUpdate::jobs(vec![job("a")]))))
            .unwrap()
            .build()
            .unwrap();

        let result = pipeline.run(PipelineState::default()).await;

        assert!(result.is_success());
        assert!(result.state.error.is_none());
        assert_eq!(result.state.jobs, vec![job("a")]);
        assert_eq!(result.records.len(), 2);
    }

    #[tokio::test]
    async fn test_panic_becomes_collaborator_failure() {
        let pipeline = PipelineBuilder::new("p")
            .stage(Arc::new(PanickingStage))
            .unwrap()
            .build()
            .unwrap();

        let result = pipeline.run(PipelineState::default()).await;

        let err = result.state.error.unwrap();
        assert_eq!(err.kind, ErrorKind::CollaboratorFailure);
        assert!(err.message.contains("renderer exploded"));
        assert!(matches!(result.status, RunStatus::Failed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stage_timeout() {
        let pipeline = PipelineBuilder::new("p")
            .with_stage_timeout(Some(Duration::from_secs(5)))
            .stage(Arc::new(SleepyStage))
            .unwrap()
            .build()
            .unwrap();

        let result = pipeline.run(PipelineState::default()).await;

        assert_eq!(result.state.error.unwrap().kind, ErrorKind::Timeout);
        assert_eq!(result.records[0].outcome, StageOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_stage() {
        let token = Arc::new(CancellationToken::new());
        token.cancel("user requested");
        let pipeline = PipelineBuilder::new("p")
            .stage(fn_stage("only", |_| Ok(StateUpdate::empty())))
            .unwrap()
            .build()
            .unwrap();

        let result = pipeline
            .run_with(
                PipelineState::default(),
                RunOptions::new().with_cancellation(token),
            )
            .await;

        let err = result.state.error.unwrap();
        assert_eq!(err.kind, ErrorKind::Cancelled);
        assert_eq!(err.message, "user requested");
        assert!(result.records.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_running_stage() {
        let token = Arc::new(CancellationToken::new());
        let pipeline = PipelineBuilder::new("p")
            .stage(Arc::new(SleepyStage))
            .unwrap()
            .build()
            .unwrap();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel("stop");
        });

        let result = pipeline
            .run_with(
                PipelineState::default(),
                RunOptions::new().with_cancellation(token),
            )
            .await;

        assert_eq!(result.state.error.unwrap().kind, ErrorKind::Cancelled);
        assert_eq!(result.status, RunStatus::Failed { reason: "stop".into() });
    }

    #[tokio::test]
    async fn test_status_callback_sees_transitions() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let pipeline = PipelineBuilder::new("p")
            .stage(fn_stage("a", |_| Ok(StateUpdate::empty())))
            .unwrap()
            .stage(fn_stage("b", |_| Ok(StateUpdate::empty())))
            .unwrap()
            .build()
            .unwrap();

        pipeline
            .run_with(
                PipelineState::default(),
                RunOptions::new().with_status_callback(Arc::new(move |status: &RunStatus| {
                    sink.lock().push(status.to_string());
                })),
            )
            .await;

        assert_eq!(
            *seen.lock(),
            vec!["Running: a", "Running: b", "Completed"]
        );
    }
}
