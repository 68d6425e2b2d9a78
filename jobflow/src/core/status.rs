//! Run and stage status enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The externally visible status of a run.
///
/// Transitions are `Idle -> Running(stage)* -> {Completed, Failed}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    /// The run has not started.
    #[default]
    Idle,
    /// The named stage is executing.
    Running {
        /// The current stage.
        stage: String,
    },
    /// Every stage completed.
    Completed {
        /// The rendered document, if the pipeline produced one.
        output: Option<PathBuf>,
    },
    /// A stage failed and the run stopped.
    Failed {
        /// The failing stage's message.
        reason: String,
    },
}

impl RunStatus {
    /// Returns true once the run can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }

    /// Returns true while a stage is executing.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Running { stage } => write!(f, "Running: {stage}"),
            Self::Completed { output: Some(path) } => write!(f, "Completed: {}", path.display()),
            Self::Completed { output: None } => write!(f, "Completed"),
            Self::Failed { reason } => write!(f, "Failed: {reason}"),
        }
    }
}

/// How a single stage execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// The stage returned an update that was merged.
    Completed,
    /// The stage returned an error or panicked.
    Failed,
    /// The stage ran past its deadline.
    TimedOut,
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::TimedOut => write!(f, "timed_out"),
        }
    }
}
