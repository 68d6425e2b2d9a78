//! Final document rendering.

use super::{names, Stage, StageResult};
use crate::checkpoint::CheckpointStore;
use crate::context::StageContext;
use crate::core::StateUpdate;
use crate::errors::ErrorInfo;
use crate::providers::DocumentRenderer;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Renders the letters into one document at a fixed path.
///
/// The letters checkpoint is the source of truth when it answers this run's
/// postings; otherwise the in-memory list is rendered.
pub struct RenderPdfStage {
    renderer: Arc<dyn DocumentRenderer>,
    checkpoints: Arc<dyn CheckpointStore>,
    output: PathBuf,
}

impl std::fmt::Debug for RenderPdfStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPdfStage")
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

impl RenderPdfStage {
    /// Creates the stage writing to `output`.
    #[must_use]
    pub fn new(
        renderer: Arc<dyn DocumentRenderer>,
        checkpoints: Arc<dyn CheckpointStore>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            renderer,
            checkpoints,
            output: output.into(),
        }
    }
}

#[async_trait]
impl Stage for RenderPdfStage {
    fn name(&self) -> &str {
        names::GENERATE_PDF
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        let state = ctx.state();
        let letters = match self.checkpoints.load_cover_letters()? {
            Some(letters) if state.letters_match_jobs(&letters) => letters,
            Some(letters) => {
                warn!(count = letters.len(), "Cover-letter checkpoint answers other postings, using this run's letters");
                state.cover_letters.clone()
            }
            None => state.cover_letters.clone(),
        };
        if letters.is_empty() {
            return Err(ErrorInfo::no_input("No cover letters to render"));
        }

        let path = self
            .renderer
            .render(&letters, &self.output)
            .await
            .map_err(|e| ErrorInfo::from_provider("Error generating PDF", &e))?;

        info!(path = %path.display(), letters = letters.len(), "PDF generated");
        Ok(StateUpdate::final_output_path(path))
    }
}
