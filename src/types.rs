// Type definitions shared across modules

use crate::algebra::EngineError;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMRequest {
    pub model: String,
    pub messages: Vec<LLMMessage>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LLMMessage {
    pub role: String, // "user", "assistant", "system"
    pub content: String,
}

impl LLMMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub finish_reason: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing endpoint or key; raised before any network traffic.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input rejected before reaching the algebra engine.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("{message}")]
    Network { endpoint: String, message: String },

    #[error("Render error: {0}")]
    Render(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn network(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Network {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("background task failed: {}", err))
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
