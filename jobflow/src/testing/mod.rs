//! Testing utilities for jobflow pipelines.
//!
//! This module provides:
//! - Scripted collaborators (job board, resume extractor, model, renderer)
//! - Stages that record, fail or panic
//! - Fixtures and run assertions

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_run_completed, assert_run_failed, assert_stage_outcomes};
pub use fixtures::{
    fenced, posting, sample_postings, sample_state, RESUME_JSON, SAMPLE_KEYWORD, SAMPLE_LOCATION,
};
pub use mocks::{
    FailingStage, PanickingStage, RecordingRenderer, RecordingStage, ScriptedLanguageModel,
    StaticResumeExtractor, StubJobBoard,
};
