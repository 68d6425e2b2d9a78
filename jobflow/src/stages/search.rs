//! Job board search across every keyword and location pair.

use super::{names, Stage, StageResult};
use crate::checkpoint::{CheckpointKind, CheckpointStore};
use crate::context::StageContext;
use crate::core::{JobPosting, StateUpdate};
use crate::errors::{ErrorInfo, ErrorKind};
use crate::providers::JobBoard;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Collapses postings sharing a link.
///
/// The last posting seen for a link wins, kept at the position where the
/// link first appeared.
#[must_use]
pub fn dedup_by_link(jobs: impl IntoIterator<Item = JobPosting>) -> Vec<JobPosting> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<JobPosting> = Vec::new();
    for job in jobs {
        match index.get(&job.link) {
            Some(&pos) => unique[pos] = job,
            None => {
                index.insert(job.link.clone(), unique.len());
                unique.push(job);
            }
        }
    }
    unique
}

/// Searches the job board for every (keyword, location) pair.
///
/// A failing or timed-out pair is logged and skipped. Pairs may run
/// concurrently; results are merged in pair order.
pub struct SearchJobsStage {
    board: Arc<dyn JobBoard>,
    checkpoints: Arc<dyn CheckpointStore>,
    concurrency: usize,
    timeout: Duration,
}

impl std::fmt::Debug for SearchJobsStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchJobsStage")
            .field("concurrency", &self.concurrency)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SearchJobsStage {
    /// Creates a sequential search stage with a 120 second per-pair deadline.
    #[must_use]
    pub fn new(board: Arc<dyn JobBoard>, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        Self {
            board,
            checkpoints,
            concurrency: 1,
            timeout: Duration::from_secs(120),
        }
    }

    /// Sets how many pairs are searched at once.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Sets the per-pair deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn search_pair(
        &self,
        ctx: &StageContext,
        keyword: &str,
        location: &str,
        limit: usize,
    ) -> Option<Vec<JobPosting>> {
        let outcome = tokio::time::timeout(self.timeout, self.board.search(keyword, location, limit)).await;
        let error = match outcome {
            Ok(Ok(jobs)) => {
                info!(keyword, location, count = jobs.len(), "Search pair completed");
                return Some(jobs);
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("Timed out after {}s", self.timeout.as_secs_f64()),
        };
        warn!(keyword, location, error = %error, "Error searching pair, continuing");
        ctx.try_emit_event(
            "search.pair_failed",
            Some(json!({
                "keyword": keyword,
                "location": location,
                "kind": ErrorKind::PartialFailure,
                "error": error,
            })),
        );
        None
    }
}

#[async_trait]
impl Stage for SearchJobsStage {
    fn name(&self) -> &str {
        names::SEARCH_JOBS
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        let state = ctx.state();
        if !state.jobs.is_empty() {
            info!(count = state.jobs.len(), "Jobs already exist in state, skipping search");
            return Ok(StateUpdate::jobs(state.jobs.clone()));
        }

        let pairs: Vec<(&str, &str)> = state
            .keywords
            .iter()
            .flat_map(|k| state.locations.iter().map(move |l| (k.as_str(), l.as_str())))
            .collect();
        let limit = state.max_jobs_per_search;

        let searches: Vec<_> = pairs
            .iter()
            .map(|&(keyword, location)| self.search_pair(ctx, keyword, location, limit).boxed())
            .collect();
        let results: Vec<Option<Vec<JobPosting>>> = stream::iter(searches)
            .buffered(self.concurrency)
            .collect()
            .await;

        let failed = results.iter().filter(|r| r.is_none()).count();
        let jobs = dedup_by_link(results.into_iter().flatten().flatten());
        info!(pairs = pairs.len(), failed, unique = jobs.len(), "Search finished");

        if jobs.is_empty() {
            return Err(ErrorInfo::no_results("No jobs found"));
        }

        self.checkpoints.save_jobs(&jobs)?;
        // Letters on disk answered the previous postings.
        self.checkpoints.clear(CheckpointKind::CoverLetters)?;
        Ok(StateUpdate::jobs(jobs))
    }
}
