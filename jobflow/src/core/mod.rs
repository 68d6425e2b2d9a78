//! Core domain model types for jobflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Job postings, resume data and cover letters
//! - The pipeline state and the partial updates stages return
//! - Run and stage status enums

mod models;
mod state;
mod status;

pub use models::{CoverLetter, JobPosting, ResumeData, ResumeProfile, StructuredResume};
pub use state::{PipelineState, StateUpdate};
pub use status::{RunStatus, StageOutcome};
