//! Error types for the jobflow pipeline.
//!
//! Stage failures never escape the engine as `Err` values. They travel inside
//! the pipeline state as [`ErrorInfo`], classified by [`ErrorKind`]. The other
//! types in this module are ordinary `Result` errors used by configuration,
//! checkpoint and provider plumbing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// The main error type for jobflow operations outside a running pipeline.
#[derive(Debug, Error)]
pub enum JobflowError {
    /// A pipeline validation error occurred.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// The configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A checkpoint could not be read or written.
    #[error("{0}")]
    Checkpoint(#[from] CheckpointError),

    /// A provider call failed.
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// A run is already in flight for the workspace.
    #[error("A run is already in progress for workspace {}", .0.display())]
    AlreadyRunning(PathBuf),

    /// No run is registered under the handle.
    #[error("Unknown run: {0}")]
    UnknownRun(Uuid),

    /// The run's result was already taken by an earlier wait.
    #[error("Run {0} was already awaited")]
    AlreadyAwaited(Uuid),

    /// The task driving a run was aborted or panicked.
    #[error("Run task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Classification of a stage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The resume file is missing.
    NotFound,
    /// The resume is neither a PDF nor a DOCX document.
    UnsupportedFormat,
    /// A stage produced nothing (no postings, no letters).
    NoResults,
    /// A stage was entered without the input it needs.
    NoInput,
    /// A provider call raised, or a stage panicked.
    CollaboratorFailure,
    /// Some items of a batch failed while the batch proceeded.
    PartialFailure,
    /// A provider call or a whole stage ran past its deadline.
    Timeout,
    /// The run was cancelled before the stage started.
    Cancelled,
    /// A checkpoint could not be read or written.
    Checkpoint,
}

impl ErrorKind {
    /// Returns the snake-case name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::UnsupportedFormat => "unsupported_format",
            Self::NoResults => "no_results",
            Self::NoInput => "no_input",
            Self::CollaboratorFailure => "collaborator_failure",
            Self::PartialFailure => "partial_failure",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Checkpoint => "checkpoint",
        }
    }

    /// Returns true if a failure of this kind halts the pipeline.
    ///
    /// Partial failures are logged by the stage that absorbs them and never
    /// reach the engine as a terminal error.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::PartialFailure)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage-level failure recorded in the pipeline state.
///
/// Displays as its message, which is what callers see as the failure reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ErrorInfo {
    /// The failure classification.
    pub kind: ErrorKind,
    /// The stage that produced the failure (empty until the engine stamps it).
    #[serde(default)]
    pub stage: String,
    /// Human-readable reason.
    pub message: String,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            stage: String::new(),
            message: message.into(),
        }
    }

    /// Sets the stage name.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = stage.into();
        self
    }

    /// A stage found nothing to work with.
    #[must_use]
    pub fn no_results(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoResults, message)
    }

    /// A stage was entered without its input.
    #[must_use]
    pub fn no_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoInput, message)
    }

    /// A collaborator raised.
    #[must_use]
    pub fn collaborator(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CollaboratorFailure, message)
    }

    /// Wraps a provider error with a stage-specific prefix.
    #[must_use]
    pub fn from_provider(context: &str, err: &ProviderError) -> Self {
        Self::new(err.kind(), format!("{context}: {err}"))
    }
}

impl From<ProviderError> for ErrorInfo {
    fn from(err: ProviderError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<CheckpointError> for ErrorInfo {
    fn from(err: CheckpointError) -> Self {
        Self::new(ErrorKind::Checkpoint, err.to_string())
    }
}

/// Failure of an external collaborator (job board, resume extraction,
/// language model, renderer).
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The input file does not exist.
    #[error("Resume not found at {}", .0.display())]
    NotFound(PathBuf),

    /// The input file is not a supported document type.
    #[error("Unsupported resume format: {0}. Use PDF or DOCX.")]
    UnsupportedFormat(String),

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote service answered with a non-success status.
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Body or decoded error message.
        message: String,
    },

    /// The call did not finish in time.
    #[error("Timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// The model answered with no content.
    #[error("Language model returned empty content")]
    EmptyContent,

    /// Text could not be extracted from a document.
    #[error("Text extraction failed: {0}")]
    Extraction(String),

    /// The document could not be rendered.
    #[error("Rendering failed: {0}")]
    Render(String),

    /// A scraped page could not be understood.
    #[error("Parse error: {0}")]
    Parse(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    /// Maps the provider failure onto the stage error taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::Timeout(_) => ErrorKind::Timeout,
            _ => ErrorKind::CollaboratorFailure,
        }
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Timeout(_) | Self::EmptyContent => true,
            _ => false,
        }
    }
}

/// Failure reading or writing a checkpoint.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Filesystem failure.
    #[error("Checkpoint IO error at {}: {source}", path.display())]
    Io {
        /// The checkpoint path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The CSV could not be encoded or decoded.
    #[error("Checkpoint CSV error at {}: {source}", path.display())]
    Csv {
        /// The checkpoint path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: csv::Error,
    },
}

/// Failure loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        /// The config path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The YAML is malformed or does not match the schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value is out of range or missing.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Error raised when pipeline validation fails.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }
}
