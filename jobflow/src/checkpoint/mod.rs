//! Durable snapshots of stage output.
//!
//! A checkpoint is written by the stage that produced the records and read
//! back when a run resumes. The rule that a present, non-empty checkpoint
//! makes its stage a no-op lives in
//! [`PipelineState::resume_from`](crate::core::PipelineState::resume_from).

mod csv_store;
mod memory;

pub use csv_store::CsvCheckpointStore;
pub use memory::InMemoryCheckpointStore;

use crate::core::{CoverLetter, JobPosting};
use crate::errors::CheckpointError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Which stage output a checkpoint holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    /// Deduplicated search results.
    Jobs,
    /// Generated letters with their postings.
    CoverLetters,
}

impl CheckpointKind {
    /// All kinds, in pipeline order.
    pub const ALL: [Self; 2] = [Self::Jobs, Self::CoverLetters];

    /// The file name used by file-backed stores.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Jobs => "jobs.csv",
            Self::CoverLetters => "cover_letters.csv",
        }
    }

    /// The column header, in order.
    #[must_use]
    pub const fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Jobs => &["job_title", "company", "job_link", "job_description"],
            Self::CoverLetters => &[
                "job_title",
                "company",
                "job_link",
                "job_description",
                "cover_letter",
            ],
        }
    }
}

impl fmt::Display for CheckpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jobs => write!(f, "jobs"),
            Self::CoverLetters => write!(f, "cover_letters"),
        }
    }
}

/// The records held by one checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointRecords {
    /// Search results.
    Jobs(Vec<JobPosting>),
    /// Generated letters.
    CoverLetters(Vec<CoverLetter>),
}

impl CheckpointRecords {
    /// The kind of checkpoint these records belong to.
    #[must_use]
    pub const fn kind(&self) -> CheckpointKind {
        match self {
            Self::Jobs(_) => CheckpointKind::Jobs,
            Self::CoverLetters(_) => CheckpointKind::CoverLetters,
        }
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Jobs(jobs) => jobs.len(),
            Self::CoverLetters(letters) => letters.len(),
        }
    }

    /// Returns true if there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Storage for stage checkpoints.
///
/// `load` returns `None` both for a missing checkpoint and for one with no
/// rows, so callers only ever see usable records.
pub trait CheckpointStore: Send + Sync + fmt::Debug {
    /// Replaces the checkpoint for the records' kind.
    fn save(&self, records: &CheckpointRecords) -> Result<(), CheckpointError>;

    /// Loads a checkpoint if it exists and is non-empty.
    fn load(&self, kind: CheckpointKind) -> Result<Option<CheckpointRecords>, CheckpointError>;

    /// Removes a checkpoint. Missing checkpoints are not an error.
    fn clear(&self, kind: CheckpointKind) -> Result<(), CheckpointError>;

    /// Where the checkpoint lives, for stores backed by files.
    fn location(&self, _kind: CheckpointKind) -> Option<PathBuf> {
        None
    }

    /// Saves search results.
    fn save_jobs(&self, jobs: &[JobPosting]) -> Result<(), CheckpointError> {
        self.save(&CheckpointRecords::Jobs(jobs.to_vec()))
    }

    /// Saves generated letters.
    fn save_cover_letters(&self, letters: &[CoverLetter]) -> Result<(), CheckpointError> {
        self.save(&CheckpointRecords::CoverLetters(letters.to_vec()))
    }

    /// Loads search results.
    fn load_jobs(&self) -> Result<Option<Vec<JobPosting>>, CheckpointError> {
        Ok(match self.load(CheckpointKind::Jobs)? {
            Some(CheckpointRecords::Jobs(jobs)) => Some(jobs),
            _ => None,
        })
    }

    /// Loads generated letters.
    fn load_cover_letters(&self) -> Result<Option<Vec<CoverLetter>>, CheckpointError> {
        Ok(match self.load(CheckpointKind::CoverLetters)? {
            Some(CheckpointRecords::CoverLetters(letters)) => Some(letters),
            _ => None,
        })
    }

    /// Removes every checkpoint.
    fn clear_all(&self) -> Result<(), CheckpointError> {
        for kind in CheckpointKind::ALL {
            self.clear(kind)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_file_names() {
        assert_eq!(CheckpointKind::Jobs.file_name(), "jobs.csv");
        assert_eq!(CheckpointKind::CoverLetters.file_name(), "cover_letters.csv");
    }

    #[test]
    fn test_cover_letter_columns_extend_job_columns() {
        let jobs = CheckpointKind::Jobs.columns();
        let letters = CheckpointKind::CoverLetters.columns();
        assert_eq!(&letters[..jobs.len()], jobs);
        assert_eq!(letters.last(), Some(&"cover_letter"));
    }

    #[test]
    fn test_records_kind_and_len() {
        let records = CheckpointRecords::Jobs(vec![JobPosting::new("a", "b", "c", "d")]);
        assert_eq!(records.kind(), CheckpointKind::Jobs);
        assert_eq!(records.len(), 1);
        assert!(CheckpointRecords::CoverLetters(Vec::new()).is_empty());
    }
}
