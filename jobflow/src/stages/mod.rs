//! Stage trait and the four job-application stages.
//!
//! A stage reads the state snapshot in its [`StageContext`] and returns
//! either a [`StateUpdate`] to merge or an [`ErrorInfo`] that halts the run.

mod letters;
mod ports;
mod render;
mod resume;
mod search;

pub use letters::{build_letter_prompt, find_placeholders, GenerateLettersStage};
pub use ports::LanguageModelPort;
pub use render::RenderPdfStage;
pub use resume::{strip_code_fences, ParseResumeStage, RESUME_SYSTEM_PROMPT};
pub use search::{dedup_by_link, SearchJobsStage};

use crate::context::StageContext;
use crate::core::{PipelineState, StateUpdate};
use crate::errors::ErrorInfo;
use async_trait::async_trait;
use std::fmt::Debug;

/// What a stage returns.
pub type StageResult = Result<StateUpdate, ErrorInfo>;

/// Stage names, in pipeline order.
pub mod names {
    /// Job board search.
    pub const SEARCH_JOBS: &str = "search_jobs";
    /// Resume extraction and structuring.
    pub const PARSE_RESUME: &str = "parse_resume";
    /// One letter per posting.
    pub const GENERATE_COVER_LETTERS: &str = "generate_cover_letters";
    /// Final document.
    pub const GENERATE_PDF: &str = "generate_pdf";
}

/// A unit of work in a pipeline.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage. Names are unique within a pipeline.
    fn name(&self) -> &str;

    /// Executes the stage against the context's state snapshot.
    async fn execute(&self, ctx: &StageContext) -> StageResult;
}

/// A stage backed by a synchronous function of the state.
pub struct FnStage<F>
where
    F: Fn(&PipelineState) -> StageResult + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&PipelineState) -> StageResult + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&PipelineState) -> StageResult + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&PipelineState) -> StageResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        (self.func)(ctx.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::JobPosting;

    #[tokio::test]
    async fn test_fn_stage_sees_snapshot() {
        let stage = FnStage::new("count", |state: &PipelineState| {
            Ok(StateUpdate::jobs(
                state
                    .keywords
                    .iter()
                    .map(|k| JobPosting::new(k.clone(), "", format!("https://x/{k}"), ""))
                    .collect(),
            ))
        });
        let state = PipelineState {
            keywords: vec!["a".into(), "b".into()],
            ..PipelineState::default()
        };

        assert_eq!(stage.name(), "count");
        let update = stage.execute(&StageContext::new(state, "count")).await.unwrap();
        assert_eq!(update.jobs.unwrap().len(), 2);
    }
}
