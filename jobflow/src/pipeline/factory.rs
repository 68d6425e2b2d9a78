//! Assembles the standard job-application pipeline from configuration.

use super::{Pipeline, PipelineBuilder, RetryPolicy};
use crate::checkpoint::CheckpointStore;
use crate::config::AppConfig;
use crate::errors::PipelineValidationError;
use crate::events::EventSink;
use crate::providers::{DocumentRenderer, JobBoard, LanguageModel, ResumeExtractor};
use crate::stages::{
    GenerateLettersStage, LanguageModelPort, ParseResumeStage, RenderPdfStage, SearchJobsStage,
};
use std::sync::Arc;

/// Name of the standard pipeline.
pub const APPLICATION_PIPELINE: &str = "job_application";

/// The external systems the standard pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Job board searched by the first stage.
    pub job_board: Arc<dyn JobBoard>,
    /// Resume text extraction.
    pub extractor: Arc<dyn ResumeExtractor>,
    /// Chat-completion model used for the resume and the letters.
    pub model: Arc<dyn LanguageModel>,
    /// Final document renderer.
    pub renderer: Arc<dyn DocumentRenderer>,
    /// Where jobs and letters are checkpointed.
    pub checkpoints: Arc<dyn CheckpointStore>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("checkpoints", &self.checkpoints)
            .finish_non_exhaustive()
    }
}

impl Collaborators {
    /// Wires the production collaborators: the LinkedIn guest board, file
    /// extraction, Ollama, the lopdf renderer and CSV checkpoints in the
    /// configured workspace.
    #[cfg(feature = "linkedin")]
    pub fn from_config(config: &AppConfig) -> Result<Self, crate::errors::ProviderError> {
        use crate::checkpoint::CsvCheckpointStore;
        use crate::providers::{FileResumeExtractor, LinkedInGuestBoard, OllamaClient, PdfRenderer};

        Ok(Self {
            job_board: Arc::new(LinkedInGuestBoard::new(config.job_search.timeout())?),
            extractor: Arc::new(FileResumeExtractor::new()),
            model: Arc::new(OllamaClient::new(&config.llm.host, config.llm.timeout())?),
            renderer: Arc::new(PdfRenderer::new()),
            checkpoints: Arc::new(CsvCheckpointStore::new(&config.output.workspace)),
        })
    }
}

/// Builds `search_jobs -> parse_resume -> generate_cover_letters -> generate_pdf`.
pub fn application_pipeline(
    config: &AppConfig,
    collaborators: &Collaborators,
    event_sink: Arc<dyn EventSink>,
) -> Result<Pipeline, PipelineValidationError> {
    let llm = LanguageModelPort::new(collaborators.model.clone())
        .with_timeout(config.llm.timeout())
        .with_retry(RetryPolicy::default().with_max_attempts(config.llm.max_attempts));

    let search = SearchJobsStage::new(
        collaborators.job_board.clone(),
        collaborators.checkpoints.clone(),
    )
    .with_concurrency(config.job_search.concurrency)
    .with_timeout(config.job_search.timeout());
    let resume = ParseResumeStage::new(collaborators.extractor.clone(), llm.clone());
    let letters = GenerateLettersStage::new(llm, collaborators.checkpoints.clone())
        .with_concurrency(config.llm.concurrency);
    let render = RenderPdfStage::new(
        collaborators.renderer.clone(),
        collaborators.checkpoints.clone(),
        config.pdf_path(),
    );

    PipelineBuilder::new(APPLICATION_PIPELINE)
        .with_event_sink(event_sink)
        .with_stage_timeout(config.pipeline.stage_timeout())
        .stage(Arc::new(search))?
        .stage(Arc::new(resume))?
        .stage(Arc::new(letters))?
        .stage(Arc::new(render))?
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::InMemoryCheckpointStore;
    use crate::events::NoOpEventSink;
    use crate::providers::{
        MockDocumentRenderer, MockJobBoard, MockLanguageModel, MockResumeExtractor,
    };
    use crate::stages::names;

    const CONFIG: &str = r#"
job_search:
  keywords: ["Data Analyst"]
  locations: ["Dubai"]
resume:
  file: resume.pdf
llm:
  model: mistral
"#;

    #[test]
    fn test_standard_stage_order() {
        let config = AppConfig::from_yaml(CONFIG).unwrap();
        let collaborators = Collaborators {
            job_board: Arc::new(MockJobBoard::new()),
            extractor: Arc::new(MockResumeExtractor::new()),
            model: Arc::new(MockLanguageModel::new()),
            renderer: Arc::new(MockDocumentRenderer::new()),
            checkpoints: Arc::new(InMemoryCheckpointStore::new()),
        };

        let pipeline =
            application_pipeline(&config, &collaborators, Arc::new(NoOpEventSink)).unwrap();

        assert_eq!(pipeline.name(), APPLICATION_PIPELINE);
        assert_eq!(
            pipeline.stage_names(),
            vec![
                names::SEARCH_JOBS,
                names::PARSE_RESUME,
                names::GENERATE_COVER_LETTERS,
                names::GENERATE_PDF,
            ]
        );
    }
}
