//! Ollama chat client.

use super::{ChatMessage, LanguageModel};
use crate::errors::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaErrorBody {
    error: String,
}

/// Calls a local Ollama server's `/api/chat` endpoint without streaming.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    host: String,
}

impl OllamaClient {
    /// Creates a client for `host` (for example `http://localhost:11434`).
    pub fn new(host: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            host: host.into().trim_end_matches('/').to_string(),
        })
    }

    /// The server base URL.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.host)
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model,
            messages,
            stream: false,
            options: ChatOptions { temperature },
        };

        let response = self.client.post(self.chat_url()).json(&request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OllamaErrorBody>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let chat: ChatResponse = response.json().await?;
        debug!(model, eval_count = ?chat.eval_count, "Ollama call succeeded");

        chat.message
            .map(|m| m.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ProviderError::EmptyContent)
    }
}
