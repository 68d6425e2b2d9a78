//! One cover letter per posting.

use super::{names, LanguageModelPort, Stage, StageResult};
use crate::checkpoint::CheckpointStore;
use crate::context::StageContext;
use crate::core::{CoverLetter, JobPosting, StateUpdate};
use crate::errors::{ErrorInfo, ErrorKind};
use crate::providers::ChatMessage;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use regex::Regex;
use serde_json::json;
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

const LETTER_TEMPERATURE: f32 = 0.7;

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\[(?:Your|Company|Date|Hiring|Recipient|Insert|Address|Phone|Email)[^\]\n]{0,40}\]").ok());

/// Builds the letter prompt for one posting.
#[must_use]
pub fn build_letter_prompt(job: &JobPosting, resume_background: &str) -> String {
    format!(
        "Write a professional and personalized cover letter for a {title} position at {company}.

MY RESUME BACKGROUND:
{resume_background}

INSTRUCTIONS:
1. Keep it concise (3 paragraphs max).
2. Highlight relevant skills from my background that match the job title.
3. Use a formal and confident tone.
4. Do NOT include placeholders like [Your Name] or [Date] if you don't have them, just sign off generically or with the Name from resume.
",
        title = job.display_title(),
        company = job.display_company(),
    )
}

/// Returns unfilled bracketed placeholders such as `[Your Name]`.
#[must_use]
pub fn find_placeholders(letter: &str) -> Vec<String> {
    PLACEHOLDER.as_ref().map_or_else(Vec::new, |re| {
        re.find_iter(letter).map(|m| m.as_str().to_string()).collect()
    })
}

/// Generates a letter for every posting.
///
/// A failed letter is logged and the posting omitted. Output order follows
/// the posting order even when letters are generated concurrently.
pub struct GenerateLettersStage {
    llm: LanguageModelPort,
    checkpoints: Arc<dyn CheckpointStore>,
    concurrency: usize,
}

impl std::fmt::Debug for GenerateLettersStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerateLettersStage")
            .field("llm", &self.llm)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl GenerateLettersStage {
    /// Creates a sequential letter stage.
    #[must_use]
    pub fn new(llm: LanguageModelPort, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        Self {
            llm,
            checkpoints,
            concurrency: 1,
        }
    }

    /// Sets how many letters are generated at once.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    async fn write_letter(
        &self,
        ctx: &StageContext,
        job: &JobPosting,
        background: &str,
    ) -> Option<CoverLetter> {
        let messages = [ChatMessage::user(build_letter_prompt(job, background))];
        match self
            .llm
            .complete(&messages, &ctx.state().model_name, LETTER_TEMPERATURE)
            .await
        {
            Ok(text) => {
                let leftover = find_placeholders(&text);
                if !leftover.is_empty() {
                    warn!(company = job.display_company(), placeholders = ?leftover, "Letter contains unfilled placeholders");
                }
                info!(company = job.display_company(), "Generated letter");
                Some(CoverLetter::new(job.clone(), text))
            }
            Err(e) => {
                warn!(company = job.display_company(), link = %job.link, error = %e, "Failed to generate letter");
                ctx.try_emit_event(
                    "letters.job_failed",
                    Some(json!({
                        "link": job.link,
                        "kind": ErrorKind::PartialFailure,
                        "error": e.to_string(),
                    })),
                );
                None
            }
        }
    }
}

#[async_trait]
impl Stage for GenerateLettersStage {
    fn name(&self) -> &str {
        names::GENERATE_COVER_LETTERS
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        let state = ctx.state();
        if state.jobs.is_empty() {
            return Err(ErrorInfo::no_input("No jobs to generate cover letters for."));
        }
        if state.letters_match_jobs(&state.cover_letters) {
            info!(count = state.cover_letters.len(), "Cover letters already exist in state, skipping generation");
            return Ok(StateUpdate::cover_letters(state.cover_letters.clone()));
        }
        if !state.cover_letters.is_empty() {
            warn!(count = state.cover_letters.len(), "Existing cover letters answer other postings, regenerating");
        }
        let Some(resume) = state.resume_data.as_ref() else {
            return Err(ErrorInfo::no_input("No resume data to personalize letters with."));
        };
        let background = resume.structured.text();

        let writes: Vec<_> = state
            .jobs
            .iter()
            .map(|job| self.write_letter(ctx, job, background).boxed())
            .collect();
        let letters: Vec<CoverLetter> = stream::iter(writes)
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect();

        let failed = state.jobs.len() - letters.len();
        info!(generated = letters.len(), failed, "Letter generation finished");

        if letters.is_empty() {
            return Err(ErrorInfo::no_results("No cover letters generated"));
        }

        self.checkpoints.save_cover_letters(&letters)?;
        Ok(StateUpdate::cover_letters(letters))
    }
}
