use async_trait::async_trait;
use reqwest::Client;

use crate::llm::chat_completions::ChatCompletionsAdapter;
use crate::settings::ApiSettings;
use crate::types::{AppResult, LLMMessage, LLMRequest, LLMResponse};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// A configured model: one adapter plus the model name it is asked for.
pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
    model: String,
}

impl LLM {
    pub fn new(adapter: Box<dyn LLMAdapter>, model: impl Into<String>) -> Self {
        Self {
            adapter,
            model: model.into(),
        }
    }

    /// Build from the effective settings. Fails before any traffic when the
    /// endpoint or key is missing.
    pub fn from_settings(client: Client, settings: &ApiSettings) -> AppResult<Self> {
        let adapter = ChatCompletionsAdapter::with_client(client, settings)?;
        Ok(Self::new(Box::new(adapter), settings.model.clone()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a single user message capped at `max_tokens`.
    pub async fn complete(&self, prompt: &str, max_tokens: u32) -> AppResult<LLMResponse> {
        let request = LLMRequest {
            model: self.model.clone(),
            messages: vec![LLMMessage::user(prompt)],
            max_tokens: Some(max_tokens),
        };
        self.adapter.create_chat_completion(&request).await
    }
}
