// Remote model client: chat-completions transport, prompts and explanation tracking

pub mod assistant;
pub mod chat_completions;
pub mod explanations;
pub mod provider;

pub use assistant::{Assistant, ExplanationRequest};
pub use chat_completions::ChatCompletionsAdapter;
pub use explanations::{ExplanationRegistry, ExplanationState};
pub use provider::*;
