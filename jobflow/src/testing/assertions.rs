//! Test assertions for pipeline runs.

use crate::core::{RunStatus, StageOutcome};
use crate::errors::ErrorKind;
use crate::pipeline::PipelineRun;

/// Asserts that every stage completed.
pub fn assert_run_completed(run: &PipelineRun) {
    assert!(
        matches!(run.status, RunStatus::Completed { .. }),
        "Expected run to complete, got {} (error: {:?})",
        run.status,
        run.state.error
    );
}

/// Asserts that the run failed in `stage` with `kind`.
pub fn assert_run_failed(run: &PipelineRun, stage: &str, kind: ErrorKind) {
    let Some(error) = &run.state.error else {
        panic!("Expected run to fail in {stage}, got {}", run.status);
    };
    assert_eq!(error.stage, stage, "Failing stage");
    assert_eq!(error.kind, kind, "Error kind");
    assert_eq!(
        run.status,
        RunStatus::Failed {
            reason: error.message.clone()
        }
    );
}

/// Asserts the executed stages and how each ended, in order.
pub fn assert_stage_outcomes(run: &PipelineRun, expected: &[(&str, StageOutcome)]) {
    let actual: Vec<(&str, StageOutcome)> = run
        .records
        .iter()
        .map(|r| (r.name.as_str(), r.outcome))
        .collect();
    assert_eq!(actual, expected);
}
