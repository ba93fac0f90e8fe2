//! Chat-completion client for the generation collaborator.

use crate::config::Settings;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("model returned no choices")]
    EmptyResponse,
}

/// Per-call knobs the pipeline controls.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub stop: Option<Vec<String>>,
}

/// Text-completion collaborator consumed by the pipeline.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, GenerationError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

pub struct OpenAiGenerator {
    client: Client,
    api_key: String,
    settings: Settings,
}

impl OpenAiGenerator {
    pub fn new(api_key: String, settings: Settings) -> Self {
        Self {
            client: Client::new(),
            api_key,
            settings,
        }
    }
}

const MAX_RETRIES: u32 = 3;
const BASE_DELAY_MS: u64 = 1000;

#[async_trait]
impl GenerationService for OpenAiGenerator {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: self.settings.llm.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.settings.llm.max_tokens,
            temperature: options.temperature,
            stop: options.stop.clone(),
        };

        let url = format!("{}/chat/completions", self.settings.llm.api_base);
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = BASE_DELAY_MS * 2_u64.pow(attempt - 1);
                tracing::warn!(
                    "[OpenAiGenerator] Retrying completion (attempt {}/{}) after {}ms delay",
                    attempt + 1,
                    MAX_RETRIES,
                    delay
                );
                tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
            }

            let response = match self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    tracing::warn!("[OpenAiGenerator] HTTP request failed: {}", e);
                    last_error = Some(GenerationError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                tracing::warn!(
                    "[OpenAiGenerator] API returned error status {}: {}",
                    status,
                    body
                );
                last_error = Some(GenerationError::Api {
                    status: status.as_u16(),
                    body,
                });
                continue;
            }

            let chat_response = match response.json::<ChatResponse>().await {
                Ok(cr) => cr,
                Err(e) => {
                    tracing::warn!("[OpenAiGenerator] Failed to decode response body: {}", e);
                    last_error = Some(GenerationError::Http(e));
                    continue;
                }
            };

            return chat_response
                .choices
                .first()
                .map(|c| c.message.content.clone())
                .ok_or(GenerationError::EmptyResponse);
        }

        Err(last_error.unwrap_or(GenerationError::EmptyResponse))
    }
}
