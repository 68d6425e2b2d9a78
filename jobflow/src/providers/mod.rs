//! External collaborators: job boards, resume extraction, language models
//! and document rendering.
//!
//! Each collaborator sits behind a trait so stages can be exercised with
//! scripted fakes. The concrete implementations here talk to real systems.

#[cfg(feature = "linkedin")]
mod linkedin;
mod ollama;
mod pdf;
mod resume_text;

#[cfg(feature = "linkedin")]
pub use linkedin::LinkedInGuestBoard;
pub use ollama::OllamaClient;
pub use pdf::{layout_letters, Font, PageLayout, PdfRenderer, TextLine, MAX_BODY_CHARS};
pub use resume_text::{FileResumeExtractor, ResumeFormat};

use crate::core::{CoverLetter, JobPosting};
use crate::errors::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Searches a job board.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobBoard: Send + Sync {
    /// Returns up to `limit` postings for one keyword and location.
    async fn search(
        &self,
        keyword: &str,
        location: &str,
        limit: usize,
    ) -> Result<Vec<JobPosting>, ProviderError>;
}

/// Extracts plain text from a resume file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResumeExtractor: Send + Sync {
    /// Fails with `NotFound` or `UnsupportedFormat` before reading anything.
    async fn extract(&self, path: &Path) -> Result<String, ProviderError>;
}

/// The speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions framing the conversation.
    System,
    /// The request.
    User,
    /// A model answer.
    Assistant,
}

/// One message of a chat completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who is speaking.
    pub role: Role,
    /// The text.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// A user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Produces chat completions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the model's answer to `messages`.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f32,
    ) -> Result<String, ProviderError>;
}

/// Renders letters into a single document.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Writes the document to `output` and returns the written path.
    async fn render(&self, letters: &[CoverLetter], output: &Path)
        -> Result<PathBuf, ProviderError>;
}
