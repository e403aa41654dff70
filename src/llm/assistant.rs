//! Free-form questions and failure explanations sent to the remote model.

use reqwest::Client;
use tracing::info;

use crate::llm::provider::LLM;
use crate::settings::SettingsStore;
use crate::types::{AppError, AppResult};

/// Reply cap for free-form questions.
pub const ASK_MAX_TOKENS: u32 = 500;
/// Reply cap for failure explanations.
pub const EXPLAIN_MAX_TOKENS: u32 = 300;

const MATH_DELIMITER_NOTE: &str = "Note: in your answer, wrap every LaTeX formula in `$...$` (inline) or `$$...$$` (display) so it renders correctly.";

/// Context of a failed engine operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplanationRequest {
    pub formula: String,
    pub error: String,
    pub variable: String,
    pub operation: String,
}

pub fn ask_prompt(query: &str, latex: &str) -> String {
    let mut prompt = query.trim().to_string();
    if !latex.trim().is_empty() {
        prompt.push_str("\n\nRelevant LaTeX:\n```latex\n");
        prompt.push_str(latex);
        prompt.push_str("\n```");
    }
    prompt.push_str("\n\n");
    prompt.push_str(MATH_DELIMITER_NOTE);
    prompt.trim().to_string()
}

pub fn explain_prompt(request: &ExplanationRequest) -> String {
    format!(
        "The user entered this LaTeX formula:\n```latex\n{}\n```\n\
         While running '{}' with respect to the variable '{}', the algebra engine reported this error:\n```\n{}\n```\n\
         Explain briefly and clearly why the error occurred, and point out what in the formula may be wrong \
         or may not fit the chosen operation. {}",
        request.formula, request.operation, request.variable, request.error, MATH_DELIMITER_NOTE
    )
}

/// Talks to the model configured in the settings store at call time.
#[derive(Clone)]
pub struct Assistant {
    client: Client,
    settings: SettingsStore,
}

impl Assistant {
    pub fn new(settings: SettingsStore) -> Self {
        Self::with_client(Client::new(), settings)
    }

    pub fn with_client(client: Client, settings: SettingsStore) -> Self {
        Self { client, settings }
    }

    /// Endpoint the next call would use, for error messages.
    pub fn endpoint(&self) -> String {
        self.settings.get().endpoint
    }

    fn connect(&self) -> AppResult<LLM> {
        LLM::from_settings(self.client.clone(), &self.settings.get())
    }

    /// Ask a free-form question, optionally about a LaTeX snippet.
    pub async fn ask(&self, query: &str, latex: &str) -> AppResult<String> {
        let llm = self.connect()?;
        if query.trim().is_empty() && latex.trim().is_empty() {
            return Err(AppError::Validation(
                "Enter a question or some LaTeX before asking the model.".to_string(),
            ));
        }
        info!(model = %llm.model(), "Asking the model");
        let response = llm.complete(&ask_prompt(query, latex), ASK_MAX_TOKENS).await?;
        Ok(response.content)
    }

    /// Ask the model why an engine operation failed.
    pub async fn explain_failure(&self, request: &ExplanationRequest) -> AppResult<String> {
        let llm = self.connect()?;
        info!(model = %llm.model(), operation = %request.operation, "Requesting failure explanation");
        let response = llm.complete(&explain_prompt(request), EXPLAIN_MAX_TOKENS).await?;
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{ApiSettings, SettingsStorage};
    use tempfile::TempDir;

    async fn assistant(endpoint: &str, key: &str, dir: &TempDir) -> Assistant {
        let defaults = ApiSettings {
            endpoint: endpoint.to_string(),
            model: "test-model".to_string(),
            key: key.to_string(),
        };
        let storage = SettingsStorage::with_path(dir.path().to_path_buf());
        Assistant::new(SettingsStore::load(defaults, storage).await.unwrap())
    }

    #[test]
    fn test_ask_prompt_layout() {
        let prompt = ask_prompt("What is this?", "x^2");
        assert!(prompt.starts_with("What is this?\n\nRelevant LaTeX:\n```latex\nx^2\n```\n\n"));
        assert!(prompt.ends_with(MATH_DELIMITER_NOTE));
        assert_eq!(ask_prompt("", ""), MATH_DELIMITER_NOTE);
    }

    #[test]
    fn test_explain_prompt_embeds_context() {
        let prompt = explain_prompt(&ExplanationRequest {
            formula: "1/0".to_string(),
            error: "division by zero".to_string(),
            variable: "x".to_string(),
            operation: "simplify".to_string(),
        });
        assert!(prompt.contains("```latex\n1/0\n```"));
        assert!(prompt.contains("'simplify'"));
        assert!(prompt.contains("'x'"));
        assert!(prompt.contains("division by zero"));
        assert!(prompt.contains("$$...$$"));
    }

    #[tokio::test]
    async fn test_missing_key_makes_no_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/chat").expect(0).create_async().await;
        let dir = TempDir::new().unwrap();
        let assistant = assistant(&format!("{}/chat", server.url()), "", &dir).await;

        assert!(matches!(
            assistant.ask("why?", "").await,
            Err(AppError::Configuration(_))
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_question_makes_no_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/chat").expect(0).create_async().await;
        let dir = TempDir::new().unwrap();
        let assistant = assistant(&format!("{}/chat", server.url()), "k", &dir).await;

        assert!(matches!(assistant.ask("  ", "").await, Err(AppError::Validation(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ask_sends_token_cap() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({"max_tokens": 500})))
            .with_body(r#"{"choices":[{"message":{"content":"answer"}}]}"#)
            .create_async()
            .await;
        let dir = TempDir::new().unwrap();
        let assistant = assistant(&format!("{}/chat", server.url()), "k", &dir).await;

        assert_eq!(assistant.ask("q", "x").await.unwrap(), "answer");
        mock.assert_async().await;
    }
}
