//! OpenAI-compatible chat completion client

use crate::core::Message;
use crate::service::{CompletionError, CompletionService, ServiceClientConfig};
use crate::core::config::DEFAULT_COMPLETION_MODEL;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Sampling temperature sent with every completion call
pub const COMPLETION_TEMPERATURE: f32 = 0.0;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for a `/chat/completions` endpoint
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    client: reqwest::Client,
    config: ServiceClientConfig,
}

impl HttpCompletionClient {
    /// Create a new completion client
    ///
    /// The request timeout comes from `config.timeout_secs`; the model falls
    /// back to the default model when `config.model` is unset.
    pub fn new(config: ServiceClientConfig) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CompletionError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn model(&self) -> &str {
        self.config.model.as_deref().unwrap_or(DEFAULT_COMPLETION_MODEL)
    }

    fn map_transport_error(&self, e: reqwest::Error) -> CompletionError {
        if e.is_timeout() {
            CompletionError::Timeout(self.config.timeout_secs)
        } else {
            CompletionError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl CompletionService for HttpCompletionClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, CompletionError> {
        let url = self.config.url("chat/completions");
        let body = ChatRequest {
            model: self.model(),
            messages,
            temperature: COMPLETION_TEMPERATURE,
        };

        debug!("Sending {} message(s) to {}", messages.len(), url);

        let mut request = self.client.post(&url).json(&body);
        if let Some(credential) = &self.config.credential {
            request = request.bearer_auth(credential);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Completion service returned {}: {}", status, body.trim());
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                CompletionError::Timeout(self.config.timeout_secs)
            } else {
                CompletionError::Malformed(e.to_string())
            }
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CompletionError::Malformed("no choices[0].message.content".to_string()))?;

        if content.trim().is_empty() {
            return Err(CompletionError::EmptyCompletion);
        }

        debug!("Completion returned {} bytes", content.len());
        Ok(content)
    }
}
