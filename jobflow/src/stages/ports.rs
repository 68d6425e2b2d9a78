//! Collaborator handles injected into stages.

use crate::errors::ProviderError;
use crate::pipeline::{with_retry, RetryPolicy};
use crate::providers::{ChatMessage, LanguageModel};
use std::sync::Arc;
use std::time::Duration;

/// A language model plus the deadline and retry policy for each call.
#[derive(Clone)]
pub struct LanguageModelPort {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for LanguageModelPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageModelPort")
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl LanguageModelPort {
    /// Wraps a model with a 300 second deadline and the default retry policy.
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            timeout: Duration::from_secs(300),
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the per-attempt deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Calls the model, bounding each attempt by the deadline and retrying
    /// transient failures.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        model_name: &str,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        with_retry(&self.retry, model_name, ProviderError::is_transient, || async move {
            tokio::time::timeout(
                self.timeout,
                self.model.complete(messages, model_name, temperature),
            )
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))?
        })
        .await
    }
}
