//! The state record threaded through a pipeline run.

use super::{CoverLetter, JobPosting, ResumeData};
use crate::checkpoint::CheckpointStore;
use crate::config::AppConfig;
use crate::errors::{CheckpointError, ErrorInfo};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, warn};

/// The single record threaded through every stage of one run.
///
/// Once `error` is set the state is frozen: [`PipelineState::apply`] ignores
/// further updates so the record can be reported as it was at the failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    /// Search keywords.
    pub keywords: Vec<String>,
    /// Search locations.
    pub locations: Vec<String>,
    /// Path to the candidate's resume.
    pub resume_path: PathBuf,
    /// Language model name.
    pub model_name: String,
    /// Per-pair search limit.
    pub max_jobs_per_search: usize,
    /// Deduplicated postings.
    #[serde(default)]
    pub jobs: Vec<JobPosting>,
    /// Parsed resume.
    #[serde(default)]
    pub resume_data: Option<ResumeData>,
    /// Generated letters.
    #[serde(default)]
    pub cover_letters: Vec<CoverLetter>,
    /// Where the rendered document was written.
    #[serde(default)]
    pub final_output_path: Option<PathBuf>,
    /// The failure that ended the run, if any.
    #[serde(default)]
    pub error: Option<ErrorInfo>,
}

impl PipelineState {
    /// Creates a fresh state for a search.
    #[must_use]
    pub fn new(
        keywords: Vec<String>,
        locations: Vec<String>,
        resume_path: impl Into<PathBuf>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            keywords,
            locations,
            resume_path: resume_path.into(),
            model_name: model_name.into(),
            max_jobs_per_search: crate::config::DEFAULT_MAX_JOBS_PER_SEARCH,
            ..Default::default()
        }
    }

    /// Creates the initial state described by a configuration.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.job_search.keywords.clone(),
            config.job_search.locations.clone(),
            config.resume.file.clone(),
            config.llm.model.clone(),
        )
        .with_max_jobs_per_search(config.job_search.max_jobs_per_search)
    }

    /// Sets the per-pair search limit.
    #[must_use]
    pub fn with_max_jobs_per_search(mut self, max: usize) -> Self {
        self.max_jobs_per_search = max;
        self
    }

    /// Pre-populates postings.
    #[must_use]
    pub fn with_jobs(mut self, jobs: Vec<JobPosting>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Pre-populates jobs and letters from non-empty checkpoints.
    ///
    /// A stage whose output is already present treats itself as complete, so
    /// this is what makes a rerun skip finished work. Letters are only taken
    /// when every one of them answers a posting in `jobs`.
    pub fn resume_from(&mut self, store: &dyn CheckpointStore) -> Result<(), CheckpointError> {
        if self.jobs.is_empty() {
            if let Some(jobs) = store.load_jobs()? {
                info!(count = jobs.len(), "Resuming with jobs from checkpoint");
                self.jobs = jobs;
            }
        }
        if self.cover_letters.is_empty() {
            if let Some(letters) = store.load_cover_letters()? {
                if self.letters_match_jobs(&letters) {
                    info!(count = letters.len(), "Resuming with cover letters from checkpoint");
                    self.cover_letters = letters;
                } else {
                    warn!(count = letters.len(), "Ignoring cover-letter checkpoint for postings not in this run");
                }
            }
        }
        Ok(())
    }

    /// Returns true when `letters` is non-empty and every letter answers a
    /// posting in `jobs`.
    #[must_use]
    pub fn letters_match_jobs(&self, letters: &[CoverLetter]) -> bool {
        let links: HashSet<&str> = self.jobs.iter().map(|job| job.link.as_str()).collect();
        !letters.is_empty()
            && letters
                .iter()
                .all(|letter| links.contains(letter.job.link.as_str()))
    }

    /// Merges a stage's partial update, field by field.
    ///
    /// Has no effect once the state carries an error.
    pub fn apply(&mut self, update: StateUpdate) {
        if self.error.is_some() {
            return;
        }
        if let Some(jobs) = update.jobs {
            self.jobs = jobs;
        }
        if let Some(resume_data) = update.resume_data {
            self.resume_data = Some(resume_data);
        }
        if let Some(letters) = update.cover_letters {
            self.cover_letters = letters;
        }
        if let Some(path) = update.final_output_path {
            self.final_output_path = Some(path);
        }
    }

    /// Records the failure that ends the run. The first failure wins.
    pub fn fail(&mut self, error: ErrorInfo) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Returns true if the run has failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// A partial update returned by a stage. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    /// Replacement postings.
    pub jobs: Option<Vec<JobPosting>>,
    /// Replacement resume data.
    pub resume_data: Option<ResumeData>,
    /// Replacement letters.
    pub cover_letters: Option<Vec<CoverLetter>>,
    /// Rendered document path.
    pub final_output_path: Option<PathBuf>,
}

impl StateUpdate {
    /// An update that changes nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// An update replacing the postings.
    #[must_use]
    pub fn jobs(jobs: Vec<JobPosting>) -> Self {
        Self {
            jobs: Some(jobs),
            ..Self::default()
        }
    }

    /// An update setting the resume data.
    #[must_use]
    pub fn resume_data(data: ResumeData) -> Self {
        Self {
            resume_data: Some(data),
            ..Self::default()
        }
    }

    /// An update replacing the letters.
    #[must_use]
    pub fn cover_letters(letters: Vec<CoverLetter>) -> Self {
        Self {
            cover_letters: Some(letters),
            ..Self::default()
        }
    }

    /// An update setting the output path.
    #[must_use]
    pub fn final_output_path(path: impl Into<PathBuf>) -> Self {
        Self {
            final_output_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Names of the fields this update sets.
    #[must_use]
    pub fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.jobs.is_some() {
            fields.push("jobs");
        }
        if self.resume_data.is_some() {
            fields.push("resume_data");
        }
        if self.cover_letters.is_some() {
            fields.push("cover_letters");
        }
        if self.final_output_path.is_some() {
            fields.push("final_output_path");
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{CheckpointStore, InMemoryCheckpointStore};
    use crate::core::StructuredResume;

    fn job(link: &str) -> JobPosting {
        JobPosting::new("Analyst", "Acme", link, "")
    }

    fn state() -> PipelineState {
        PipelineState::new(
            vec!["Data Analyst".into()],
            vec!["Dubai".into()],
            "resume.pdf",
            "mistral",
        )
    }

    #[test]
    fn test_new_state_defaults() {
        let state = state();
        assert_eq!(state.max_jobs_per_search, 10);
        assert!(state.jobs.is_empty());
        assert!(state.resume_data.is_none());
        assert!(!state.is_failed());
    }

    #[test]
    fn test_apply_overwrites_only_present_fields() {
        let mut state = state().with_jobs(vec![job("a")]);
        state.apply(StateUpdate::final_output_path("out.pdf"));

        assert_eq!(state.jobs, vec![job("a")]);
        assert_eq!(state.final_output_path, Some(PathBuf::from("out.pdf")));

        state.apply(StateUpdate::jobs(vec![job("b")]));
        assert_eq!(state.jobs, vec![job("b")]);
    }

    #[test]
    fn test_failed_state_is_frozen() {
        let mut state = state();
        state.fail(ErrorInfo::no_results("No jobs found"));
        state.apply(StateUpdate::jobs(vec![job("a")]));
        state.apply(StateUpdate::resume_data(ResumeData {
            raw_text: "cv".into(),
            structured: StructuredResume::classify("{}"),
        }));

        assert!(state.jobs.is_empty());
        assert!(state.resume_data.is_none());
    }

    #[test]
    fn test_first_failure_wins() {
        let mut state = state();
        state.fail(ErrorInfo::no_results("first"));
        state.fail(ErrorInfo::no_input("second"));
        assert_eq!(state.error.unwrap().message, "first");
    }

    #[test]
    fn test_update_fields() {
        let update = StateUpdate {
            jobs: Some(Vec::new()),
            final_output_path: Some(PathBuf::from("x.pdf")),
            ..StateUpdate::default()
        };
        assert_eq!(update.fields(), vec!["jobs", "final_output_path"]);
        assert!(StateUpdate::empty().fields().is_empty());
    }

    #[test]
    fn test_resume_from_checkpoints() {
        let store = InMemoryCheckpointStore::new();
        store.save_jobs(&[job("a"), job("b")]).unwrap();

        let mut state = state();
        state.resume_from(&store).unwrap();

        assert_eq!(state.jobs.len(), 2);
        assert!(state.cover_letters.is_empty());
    }

    #[test]
    fn test_resume_keeps_existing_jobs() {
        let store = InMemoryCheckpointStore::new();
        store.save_jobs(&[job("a"), job("b")]).unwrap();

        let mut state = state().with_jobs(vec![job("z")]);
        state.resume_from(&store).unwrap();

        assert_eq!(state.jobs, vec![job("z")]);
    }

    #[test]
    fn test_resume_ignores_letters_for_unknown_jobs() {
        let store = InMemoryCheckpointStore::new();
        store
            .save_cover_letters(&[CoverLetter::new(job("https://old/1"), "stale")])
            .unwrap();

        let mut without_jobs = state();
        without_jobs.resume_from(&store).unwrap();
        assert!(without_jobs.jobs.is_empty());
        assert!(without_jobs.cover_letters.is_empty());

        store.save_jobs(&[job("https://new/1")]).unwrap();
        let mut with_new_jobs = state();
        with_new_jobs.resume_from(&store).unwrap();
        assert_eq!(with_new_jobs.jobs, vec![job("https://new/1")]);
        assert!(with_new_jobs.cover_letters.is_empty());
    }

    #[test]
    fn test_resume_takes_letters_matching_jobs() {
        let store = InMemoryCheckpointStore::new();
        store.save_jobs(&[job("a"), job("b")]).unwrap();
        store
            .save_cover_letters(&[CoverLetter::new(job("b"), "Dear team")])
            .unwrap();

        let mut state = state();
        state.resume_from(&store).unwrap();
        assert_eq!(state.cover_letters.len(), 1);
    }

    #[test]
    fn test_letters_match_jobs() {
        let state = state().with_jobs(vec![job("a"), job("b")]);
        assert!(state.letters_match_jobs(&[CoverLetter::new(job("a"), "x")]));
        assert!(!state.letters_match_jobs(&[CoverLetter::new(job("c"), "x")]));
        assert!(!state.letters_match_jobs(&[]));
    }
}
