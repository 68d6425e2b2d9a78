//! Scripted collaborators and stages for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::context::StageContext;
use crate::core::{CoverLetter, JobPosting, StateUpdate};
use crate::errors::{ErrorInfo, ProviderError};
use crate::providers::{ChatMessage, DocumentRenderer, JobBoard, LanguageModel, ResumeExtractor, Role};
use crate::stages::{Stage, StageResult};

/// A job board answering from a fixed table keyed by (keyword, location).
///
/// Unknown pairs return no postings. Pairs registered with
/// [`StubJobBoard::failing`] return an API error.
#[derive(Debug, Default)]
pub struct StubJobBoard {
    results: HashMap<(String, String), Vec<JobPosting>>,
    failures: HashMap<(String, String), String>,
    delays: HashMap<(String, String), Duration>,
    calls: Mutex<Vec<(String, String)>>,
}

impl StubJobBoard {
    /// Creates an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the postings returned for a pair.
    #[must_use]
    pub fn with_results(mut self, keyword: &str, location: &str, jobs: Vec<JobPosting>) -> Self {
        self.results.insert((keyword.into(), location.into()), jobs);
        self
    }

    /// Makes a pair fail.
    #[must_use]
    pub fn failing(mut self, keyword: &str, location: &str, message: &str) -> Self {
        self.failures
            .insert((keyword.into(), location.into()), message.into());
        self
    }

    /// Delays the answer for a pair.
    #[must_use]
    pub fn with_delay(mut self, keyword: &str, location: &str, delay: Duration) -> Self {
        self.delays.insert((keyword.into(), location.into()), delay);
        self
    }

    /// Pairs searched so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl JobBoard for StubJobBoard {
    async fn search(
        &self,
        keyword: &str,
        location: &str,
        limit: usize,
    ) -> Result<Vec<JobPosting>, ProviderError> {
        let key = (keyword.to_string(), location.to_string());
        self.calls.lock().push(key.clone());

        if let Some(delay) = self.delays.get(&key) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(message) = self.failures.get(&key) {
            return Err(ProviderError::Api {
                status: 400,
                message: message.clone(),
            });
        }
        Ok(self
            .results
            .get(&key)
            .map(|jobs| jobs.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// A resume extractor returning fixed text for any path.
#[derive(Debug, Clone)]
pub struct StaticResumeExtractor {
    text: String,
}

impl StaticResumeExtractor {
    /// Creates an extractor returning `text`.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl ResumeExtractor for StaticResumeExtractor {
    async fn extract(&self, _path: &Path) -> Result<String, ProviderError> {
        Ok(self.text.clone())
    }
}

/// A language model that answers resume requests with a fixed reply and
/// letter requests by matching the prompt.
///
/// A request is a resume request when it carries a system message. Letter
/// rules are checked in registration order; the first whose needle appears
/// in the prompt decides the reply, its delay and whether it fails.
#[derive(Debug, Default)]
pub struct ScriptedLanguageModel {
    resume_reply: String,
    rules: Vec<LetterRule>,
    calls: AtomicUsize,
}

#[derive(Debug)]
struct LetterRule {
    needle: String,
    reply: Result<String, String>,
    delay: Duration,
}

impl ScriptedLanguageModel {
    /// Creates a model replying `resume_reply` to resume requests.
    #[must_use]
    pub fn new(resume_reply: impl Into<String>) -> Self {
        Self {
            resume_reply: resume_reply.into(),
            ..Self::default()
        }
    }

    /// Replies `letter` to prompts containing `needle`.
    #[must_use]
    pub fn letter_for(mut self, needle: &str, letter: &str) -> Self {
        self.rules.push(LetterRule {
            needle: needle.into(),
            reply: Ok(letter.into()),
            delay: Duration::ZERO,
        });
        self
    }

    /// Like [`Self::letter_for`] but answers after `delay`.
    #[must_use]
    pub fn slow_letter_for(mut self, needle: &str, letter: &str, delay: Duration) -> Self {
        self.rules.push(LetterRule {
            needle: needle.into(),
            reply: Ok(letter.into()),
            delay,
        });
        self
    }

    /// Fails prompts containing `needle`.
    #[must_use]
    pub fn fail_for(mut self, needle: &str, message: &str) -> Self {
        self.rules.push(LetterRule {
            needle: needle.into(),
            reply: Err(message.into()),
            delay: Duration::ZERO,
        });
        self
    }

    /// Number of completions requested.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for ScriptedLanguageModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _model: &str,
        _temperature: f32,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if messages.iter().any(|m| m.role == Role::System) {
            return Ok(self.resume_reply.clone());
        }

        let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        let Some(rule) = self.rules.iter().find(|r| prompt.contains(&r.needle)) else {
            return Ok(format!("Dear Hiring Manager,\n\n{prompt}"));
        };
        if !rule.delay.is_zero() {
            tokio::time::sleep(rule.delay).await;
        }
        rule.reply.clone().map_err(|message| ProviderError::Api {
            status: 400,
            message,
        })
    }
}

/// A renderer that records what it was asked to draw and writes nothing.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    rendered: Mutex<Vec<Vec<CoverLetter>>>,
}

impl RecordingRenderer {
    /// Creates a new recording renderer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Letter batches received, one per render call.
    #[must_use]
    pub fn rendered(&self) -> Vec<Vec<CoverLetter>> {
        self.rendered.lock().clone()
    }
}

#[async_trait]
impl DocumentRenderer for RecordingRenderer {
    async fn render(&self, letters: &[CoverLetter], output: &Path) -> Result<PathBuf, ProviderError> {
        self.rendered.lock().push(letters.to_vec());
        Ok(output.to_path_buf())
    }
}

/// A stage that counts its invocations and returns an empty update.
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    calls: AtomicUsize,
}

impl RecordingStage {
    /// Creates a new recording stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of times the stage ran.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &StageContext) -> StageResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(StateUpdate::empty())
    }
}

/// A stage that always returns the same error.
#[derive(Debug)]
pub struct FailingStage {
    name: String,
    error: ErrorInfo,
}

impl FailingStage {
    /// Creates a stage failing with `error`.
    #[must_use]
    pub fn new(name: impl Into<String>, error: ErrorInfo) -> Self {
        Self {
            name: name.into(),
            error,
        }
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &StageContext) -> StageResult {
        Err(self.error.clone())
    }
}

/// A stage that panics.
#[derive(Debug)]
pub struct PanickingStage {
    name: String,
}

impl PanickingStage {
    /// Creates a new panicking stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for PanickingStage {
    fn name(&self) -> &str {
        &self.name
    }

    #[allow(clippy::panic)]
    async fn execute(&self, _ctx: &StageContext) -> StageResult {
        panic!("{} blew up", self.name);
    }
}
