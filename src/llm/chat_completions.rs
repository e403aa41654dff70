// OpenAI-compatible chat-completions adapter.
// Works with any endpoint that accepts `{model, messages, max_tokens}` with a
// bearer token and answers `{choices: [{message: {content}}]}`.

use crate::llm::provider::LLMAdapter;
use crate::settings::ApiSettings;
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest, LLMResponse};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Returned instead of failing when a 2xx reply carries no usable text.
pub const NO_CONTENT_PLACEHOLDER: &str = "No content could be extracted from the API response.";

pub struct ChatCompletionsAdapter {
    client: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [LLMMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl ChatCompletionsAdapter {
    pub fn new(settings: &ApiSettings) -> AppResult<Self> {
        Self::with_client(Client::new(), settings)
    }

    pub fn with_client(client: Client, settings: &ApiSettings) -> AppResult<Self> {
        let endpoint = settings.endpoint.trim();
        let api_key = settings.key.trim();
        if endpoint.is_empty() || api_key.is_empty() {
            return Err(AppError::Configuration(
                "the model API endpoint and key must both be set before calling the model".to_string(),
            ));
        }
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn error_message(status: reqwest::StatusCode, body: &str) -> String {
        let message = serde_json::from_str::<ErrorResponse>(body)
            .ok()
            .and_then(|e| e.error.message)
            .filter(|m| !m.is_empty())
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| "Unknown API error".to_string());
        format!("HTTP error! status: {}, message: {}", status.as_u16(), message)
    }

    fn extract(body: &str) -> LLMResponse {
        let parsed: Option<serde_json::Value> = match serde_json::from_str(body) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Model response is not valid JSON: {}", e);
                None
            }
        };
        let content = parsed
            .as_ref()
            .and_then(|v| v.pointer("/choices/0/message/content"))
            .and_then(|c| c.as_str())
            .map(str::to_string);
        let finish_reason = parsed
            .as_ref()
            .and_then(|v| v.pointer("/choices/0/finish_reason"))
            .and_then(|r| r.as_str())
            .map(str::to_string);

        LLMResponse {
            content: content.unwrap_or_else(|| NO_CONTENT_PLACEHOLDER.to_string()),
            finish_reason,
        }
    }
}

#[async_trait]
impl LLMAdapter for ChatCompletionsAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let body = ChatRequest {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
        };
        debug!(endpoint = %self.endpoint, model = %request.model, "Calling chat completions");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::network(&self.endpoint, e.to_string()))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(AppError::network(&self.endpoint, Self::error_message(status, &text)));
        }

        Ok(Self::extract(&text))
    }
}
