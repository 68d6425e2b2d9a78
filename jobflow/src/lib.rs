//! # Jobflow
//!
//! A resumable job-application pipeline.
//!
//! Jobflow searches a job board for every keyword and location pair, turns a
//! resume into structured text with a language model, writes one cover letter
//! per posting and renders all letters into a single PDF:
//!
//! - **Merge-or-halt execution**: each stage returns a partial update or an
//!   error; the first error freezes the state and ends the run
//! - **Checkpoints**: jobs and letters are written to CSV so a rerun skips
//!   finished work
//! - **Run manager**: at most one run per workspace, with status queries and
//!   cooperative cancellation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use jobflow::prelude::*;
//! use std::sync::Arc;
//!
//! let config = AppConfig::load("config/config.yaml")?;
//! let collaborators = Collaborators::from_config(&config)?;
//! let pipeline = application_pipeline(&config, &collaborators, Arc::new(LoggingEventSink::default()))?;
//!
//! let mut state = PipelineState::from_config(&config);
//! state.resume_from(collaborators.checkpoints.as_ref())?;
//! let run = pipeline.run(state).await;
//! println!("{}", run.status);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod checkpoint;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod providers;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::checkpoint::{
        CheckpointKind, CheckpointRecords, CheckpointStore, CsvCheckpointStore,
        InMemoryCheckpointStore,
    };
    pub use crate::config::AppConfig;
    pub use crate::context::{RunIdentity, StageContext};
    pub use crate::core::{
        CoverLetter, JobPosting, PipelineState, ResumeData, RunStatus, StageOutcome,
        StateUpdate, StructuredResume,
    };
    pub use crate::errors::{
        CheckpointError, ConfigError, ErrorInfo, ErrorKind, JobflowError,
        PipelineValidationError, ProviderError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{
        application_pipeline, Collaborators, Pipeline, PipelineBuilder, PipelineRun,
        RunHandle, RunManager, RunOptions,
    };
    pub use crate::providers::{DocumentRenderer, JobBoard, LanguageModel, ResumeExtractor};
    pub use crate::stages::{Stage, StageResult};
}
