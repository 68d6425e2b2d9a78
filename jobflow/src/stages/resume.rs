//! Resume extraction and structuring.

use super::{names, LanguageModelPort, Stage, StageResult};
use crate::context::StageContext;
use crate::core::{ResumeData, StateUpdate, StructuredResume};
use crate::errors::{ErrorInfo, ErrorKind, ProviderError};
use crate::providers::{ChatMessage, ResumeExtractor};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Instruction sent ahead of the resume text.
pub const RESUME_SYSTEM_PROMPT: &str = "You are an expert resume analyzer.
Given the resume text, extract structured information in JSON format with the following keys:
- name
- education (list)
- skills (list of strings)
- projects (list)
- experience (list)
- summary (short professional summary)

Return ONLY valid JSON.";

/// Removes a markdown code fence around model output.
///
/// Text after a ```` ```json ```` marker wins over a bare ```` ``` ````
/// fence. Unfenced output is returned unchanged.
#[must_use]
pub fn strip_code_fences(output: &str) -> String {
    if let Some((_, rest)) = output.split_once("```json") {
        let inner = rest.split("```").next().unwrap_or(rest);
        return inner.trim().to_string();
    }
    let mut parts = output.split("```");
    match (parts.next(), parts.next()) {
        (Some(_), Some(inner)) => inner.trim().to_string(),
        _ => output.to_string(),
    }
}

/// Extracts resume text and asks the model for a structured reading.
pub struct ParseResumeStage {
    extractor: Arc<dyn ResumeExtractor>,
    llm: LanguageModelPort,
}

impl std::fmt::Debug for ParseResumeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseResumeStage")
            .field("llm", &self.llm)
            .finish_non_exhaustive()
    }
}

impl ParseResumeStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(extractor: Arc<dyn ResumeExtractor>, llm: LanguageModelPort) -> Self {
        Self { extractor, llm }
    }
}

/// A missing file is reported as is; anything else gets the stage prefix.
fn parse_error(err: ProviderError) -> ErrorInfo {
    if err.kind() == ErrorKind::NotFound {
        ErrorInfo::from(err)
    } else {
        ErrorInfo::from_provider("Error parsing resume", &err)
    }
}

#[async_trait]
impl Stage for ParseResumeStage {
    fn name(&self) -> &str {
        names::PARSE_RESUME
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        let state = ctx.state();
        let raw_text = self
            .extractor
            .extract(&state.resume_path)
            .await
            .map_err(parse_error)?;

        let messages = [
            ChatMessage::system(RESUME_SYSTEM_PROMPT),
            ChatMessage::user(raw_text.clone()),
        ];
        let output = self
            .llm
            .complete(&messages, &state.model_name, 0.0)
            .await
            .map_err(parse_error)?;

        let structured = StructuredResume::classify(strip_code_fences(&output));
        if structured.is_parsed() {
            info!(chars = raw_text.len(), "Resume parsed");
        } else {
            warn!("Model did not return clean JSON; keeping raw output");
        }

        Ok(StateUpdate::resume_data(ResumeData {
            raw_text,
            structured,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PipelineState;
    use crate::pipeline::RetryPolicy;
    use crate::providers::{MockLanguageModel, MockResumeExtractor, Role};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn state() -> PipelineState {
        PipelineState::new(vec!["k".into()], vec!["l".into()], "cv.pdf", "mistral")
    }

    fn stage(extractor: MockResumeExtractor, model: MockLanguageModel) -> ParseResumeStage {
        ParseResumeStage::new(
            Arc::new(extractor),
            LanguageModelPort::new(Arc::new(model)).with_retry(RetryPolicy::none()),
        )
    }

    #[test]
    fn test_strip_json_fence() {
        assert_eq!(
            strip_code_fences("```json\n{\"name\":\"A\"}\n```"),
            r#"{"name":"A"}"#
        );
    }

    #[test]
    fn test_strip_bare_fence_with_preamble() {
        assert_eq!(strip_code_fences("Here you go:\n```\n{}\n```\nThanks"), "{}");
    }

    #[test]
    fn test_unfenced_output_is_unchanged() {
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "  {\"a\": 1} ");
    }

    #[tokio::test]
    async fn test_parses_fenced_json() {
        let mut extractor = MockResumeExtractor::new();
        extractor
            .expect_extract()
            .returning(|_| Ok("Jane Doe, SQL".into()));
        let mut model = MockLanguageModel::new();
        model
            .expect_complete()
            .withf(|messages, model, temperature| {
                messages.len() == 2
                    && messages[0].role == Role::System
                    && messages[0].content.ends_with("Return ONLY valid JSON.")
                    && messages[1].content == "Jane Doe, SQL"
                    && model == "mistral"
                    && temperature.abs() < f32::EPSILON
            })
            .returning(|_, _, _| Ok("```json\n{\"name\":\"A\",\"skills\":[\"X\"]}\n```".into()));

        let update = stage(extractor, model)
            .execute(&StageContext::new(state(), "parse_resume"))
            .await
            .unwrap();
        let data = update.resume_data.unwrap();

        assert_eq!(data.raw_text, "Jane Doe, SQL");
        assert_eq!(data.structured.text(), r#"{"name":"A","skills":["X"]}"#);
        assert_eq!(data.structured.profile().unwrap().name.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_prose_output_is_kept_unparsed() {
        let mut extractor = MockResumeExtractor::new();
        extractor.expect_extract().returning(|_| Ok("cv".into()));
        let mut model = MockLanguageModel::new();
        model
            .expect_complete()
            .returning(|_, _, _| Ok("Jane is an analyst.".into()));

        let update = stage(extractor, model)
            .execute(&StageContext::new(state(), "parse_resume"))
            .await
            .unwrap();
        let structured = update.resume_data.unwrap().structured;
        assert!(!structured.is_parsed());
        assert_eq!(structured.text(), "Jane is an analyst.");
    }

    #[tokio::test]
    async fn test_missing_resume() {
        let mut extractor = MockResumeExtractor::new();
        extractor
            .expect_extract()
            .returning(|path| Err(ProviderError::NotFound(path.to_path_buf())));
        let mut model = MockLanguageModel::new();
        model.expect_complete().times(0);

        let err = stage(extractor, model)
            .execute(&StageContext::new(state(), "parse_resume"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.message, format!("Resume not found at {}", PathBuf::from("cv.pdf").display()));
    }

    #[tokio::test]
    async fn test_model_failure_is_collaborator_failure() {
        let mut extractor = MockResumeExtractor::new();
        extractor.expect_extract().returning(|_| Ok("cv".into()));
        let mut model = MockLanguageModel::new();
        model.expect_complete().returning(|_, _, _| {
            Err(ProviderError::Api {
                status: 500,
                message: "boom".into(),
            })
        });

        let err = stage(extractor, model)
            .execute(&StageContext::new(state(), "parse_resume"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::CollaboratorFailure);
        assert!(err.message.starts_with("Error parsing resume: "));
    }
}
