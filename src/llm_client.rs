// ============================================================================
// File: src/llm_client.rs
// Ollama client over the OpenAI-compatible chat completions API
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::TransportError;
use crate::models::{ChatCompletionRequest, ChatCompletionResponse, Message};

/// One completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// Raw text returned by the model
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    /// Model name as reported by the server, when it reports one
    pub model: Option<String>,
}

/// A service that accepts a prompt and returns generated text
#[async_trait]
pub trait TextCompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, TransportError>;
}

pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TextCompletionProvider for OllamaClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, TransportError> {
        let body = ChatCompletionRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(
            model = %request.model,
            temperature = request.temperature,
            max_tokens = request.max_tokens,
            "Calling model"
        );

        // Ollama ignores the key but the OpenAI-compatible route expects one
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth("ollama")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: error_text.chars().take(500).collect(),
            });
        }

        let response_text = response.text().await?;
        let response_data: ChatCompletionResponse = serde_json::from_str(&response_text)
            .map_err(|e| {
                TransportError::Decode(format!(
                    "failed to parse response from model '{}': {}",
                    request.model, e
                ))
            })?;

        let choice = response_data.choices.into_iter().next().ok_or_else(|| {
            TransportError::Decode(format!("model '{}' returned no choices", request.model))
        })?;

        let content = choice.message.content.unwrap_or_default();

        if content.is_empty() {
            return Err(TransportError::Decode(format!(
                "model '{}' returned empty content",
                request.model
            )));
        }

        Ok(Completion {
            content,
            model: response_data.model,
        })
    }
}
