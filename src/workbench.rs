//! Per-action orchestration behind the HTTP handlers.
//!
//! Every action ends in rendered region HTML, whatever fails along the way.
//! Engine and plot work runs on the blocking pool; failure explanations run
//! as detached tasks whose results land in the [`ExplanationRegistry`].

use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::algebra::{AlgebraEngine, Symbolic};
use crate::config::Config;
use crate::llm::{Assistant, ExplanationRegistry, ExplanationRequest, ExplanationState};
use crate::math::{Dispatcher, FailureKind, OperationKind, OperationRequest, OperationResult};
use crate::models::{MathRequest, MathResponse, PlotResponse};
use crate::plot::{PlotError, PlotRequest, Plotter};
use crate::render::markdown::render_markdown_or_raw;
use crate::render::{
    error_block, escape_html, loading_block, math_block, message_block, message_block_html, preview_region,
    typeset_region, MathMarkup, MessageKind, Region, Typesetter,
};
use crate::settings::SettingsStore;
use crate::types::AppError;

pub struct Workbench {
    dispatcher: Dispatcher,
    plotter: Arc<Plotter>,
    assistant: Assistant,
    explanations: ExplanationRegistry,
    typesetter: Option<Arc<dyn Typesetter>>,
}

impl Workbench {
    pub fn new(config: &Config, settings: SettingsStore) -> Self {
        let engine: Arc<dyn AlgebraEngine> = Arc::new(Symbolic);
        let typesetter: Option<Arc<dyn Typesetter>> = if config.render.typesetting_enabled {
            Some(Arc::new(MathMarkup))
        } else {
            None
        };
        Self {
            dispatcher: Dispatcher::new(engine.clone()),
            plotter: Arc::new(Plotter::new(engine, config.render.plot_samples, config.render.plot_width)),
            assistant: Assistant::new(settings),
            explanations: ExplanationRegistry::new(),
            typesetter,
        }
    }

    pub fn typesetting_enabled(&self) -> bool {
        self.typesetter.is_some()
    }

    pub fn explanations(&self) -> &ExplanationRegistry {
        &self.explanations
    }

    fn typeset(&self, region: &mut Region, context: &str) {
        typeset_region(region, self.typesetter.as_deref(), context);
    }

    /// Live preview of the editor. Blank input clears the region.
    pub fn preview(&self, latex: &str) -> String {
        let mut region = preview_region(latex);
        if !region.is_empty() {
            self.typeset(&mut region, "preview");
        }
        region.into_html()
    }

    pub async fn run_operation(&self, request: MathRequest) -> MathResponse {
        let kind = match request.operation.parse::<OperationKind>() {
            Ok(kind) => kind,
            Err(message) => {
                warn!("Rejected operation request: {}", message);
                return MathResponse {
                    html: message_block(MessageKind::Error, &message),
                    latex: None,
                    explanation_id: None,
                    editor: None,
                };
            }
        };

        let operation = OperationRequest {
            kind,
            formula: request.formula.clone(),
            variable: request.variable.clone(),
            parameter: request.parameter.clone(),
        };
        let variable = operation.variable_name();
        info!(operation = %kind, variable = %variable, "Running operation");

        let dispatcher = self.dispatcher.clone();
        let job = operation.clone();
        let result = match tokio::task::spawn_blocking(move || dispatcher.execute(&job)).await {
            Ok(result) => result,
            Err(e) => {
                let e = AppError::from(e);
                error!("Operation task failed: {}", e);
                return MathResponse {
                    html: error_block(&format!("Error while running {}", kind), &e.to_string()),
                    latex: None,
                    explanation_id: None,
                    editor: None,
                };
            }
        };

        match result {
            OperationResult::Failure { kind: FailureKind::Validation, message } => MathResponse {
                html: message_block(MessageKind::Warning, &message),
                latex: None,
                explanation_id: None,
                editor: None,
            },
            OperationResult::Failure { kind: FailureKind::Engine, message } => {
                warn!(operation = %kind, "Engine failure: {}", message);
                let id = self
                    .spawn_explanation(ExplanationRequest {
                        formula: request.formula.clone(),
                        error: message.clone(),
                        variable: variable.clone(),
                        operation: kind.to_string(),
                    })
                    .await;
                let mut html = error_block(
                    &format!("Error while running {}", kind),
                    &format!("{}; check the formula and the variable ('{}').", message, variable),
                );
                html.push_str(&format!(
                    r#"<div class="mt-3 model-explanation-slot" data-explanation-id="{}">{}</div>"#,
                    id,
                    loading_block("Asking the model for an explanation...")
                ));
                MathResponse {
                    html,
                    latex: None,
                    explanation_id: Some(id),
                    editor: None,
                }
            }
            success => {
                let latex = success.display_latex(&self.dispatcher.variable_latex(&variable));
                let mut region = Region::with_html(math_block(&latex));
                self.typeset(&mut region, kind.as_str());
                let editor = request.replace_editor.then(|| {
                    let mut buffer = request.editor.clone().unwrap_or_default();
                    buffer.clear();
                    buffer.insert_at_cursor(&latex);
                    buffer
                });
                MathResponse {
                    html: region.into_html(),
                    latex: Some(latex),
                    explanation_id: None,
                    editor,
                }
            }
        }
    }

    /// Start the one explanation attempt for a failure. Its own errors end up
    /// in its region and never retrigger an explanation.
    async fn spawn_explanation(&self, request: ExplanationRequest) -> Uuid {
        let registry = self.explanations.clone();
        let assistant = self.assistant.clone();
        let typesetter = self.typesetter.clone();
        let id = registry.begin().await;
        tokio::spawn(async move {
            let html = match assistant.explain_failure(&request).await {
                Ok(content) => {
                    let mut region = Region::with_html(message_block_html(
                        MessageKind::Info,
                        &format!(
                            "<strong>Model explanation:</strong><br>{}",
                            render_markdown_or_raw(&content)
                        ),
                    ));
                    typeset_region(&mut region, typesetter.as_deref(), "failure explanation");
                    region.into_html()
                }
                Err(AppError::Configuration(_)) => message_block(
                    MessageKind::Warning,
                    "Cannot ask the model: the API configuration is incomplete.",
                ),
                Err(e) => {
                    warn!("Failure explanation failed: {}", e);
                    message_block(MessageKind::Warning, &format!("Could not get a model explanation: {}", e))
                }
            };
            registry.complete(id, html).await;
        });
        id
    }

    pub async fn explanation(&self, id: Uuid) -> Option<ExplanationState> {
        self.explanations.take(id).await
    }

    pub async fn plot(&self, request: PlotRequest) -> PlotResponse {
        let plotter = self.plotter.clone();
        let outcome = match tokio::task::spawn_blocking(move || plotter.plot(&request)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let e = AppError::from(e);
                error!("Plot task failed: {}", e);
                return PlotResponse {
                    html: error_block("Plot failed", &e.to_string()),
                    config: None,
                    svg: None,
                };
            }
        };

        match outcome {
            Ok(outcome) => {
                let mut region = Region::new();
                if outcome.is_partial() {
                    let lines: Vec<String> = outcome.errors.iter().map(|e| escape_html(e)).collect();
                    region.append(&message_block_html(
                        MessageKind::Warning,
                        &format!("<strong>Some functions could not be plotted:</strong><br>{}", lines.join("<br>")),
                    ));
                }
                for warning in &outcome.warnings {
                    region.append(&message_block(MessageKind::Info, warning));
                }
                if !region.is_empty() {
                    self.typeset(&mut region, "plot warnings");
                }
                PlotResponse {
                    html: region.into_html(),
                    config: Some(outcome.config),
                    svg: outcome.svg,
                }
            }
            Err(e) => {
                let detail = match &e {
                    PlotError::AllFailed(errors) => errors.iter().map(|l| escape_html(l)).collect::<Vec<_>>().join("<br>"),
                    PlotError::NoExpressions => escape_html(&e.to_string()),
                };
                let mut region = Region::with_html(message_block_html(
                    MessageKind::Error,
                    &format!("<strong>Plot failed:</strong><br>{}", detail),
                ));
                self.typeset(&mut region, "plot failure");
                PlotResponse {
                    html: region.into_html(),
                    config: None,
                    svg: None,
                }
            }
        }
    }

    /// Free-form question to the model, rendered as markdown then typeset.
    pub async fn ask(&self, query: &str, latex: &str) -> String {
        match self.assistant.ask(query, latex).await {
            Ok(content) => {
                let mut region = Region::with_html(format!(
                    r#"<div class="model-response">{}</div>"#,
                    render_markdown_or_raw(&content)
                ));
                self.typeset(&mut region, "model response");
                region.into_html()
            }
            Err(AppError::Validation(message)) => message_block(MessageKind::Warning, &message),
            Err(AppError::Configuration(_)) => message_block(
                MessageKind::Error,
                "The API configuration is incomplete. Set an endpoint and key in the settings.",
            ),
            Err(e) => {
                let endpoint = match &e {
                    AppError::Network { endpoint, .. } => endpoint.clone(),
                    _ => self.assistant.endpoint(),
                };
                error!("Model call failed: {}", e);
                network_error_block(&endpoint, &e.to_string())
            }
        }
    }
}

fn network_error_block(endpoint: &str, message: &str) -> String {
    message_block_html(
        MessageKind::Error,
        &format!(
            "<strong>Error while calling the model:</strong><br>{}<br>Please check:\
             <ol class=\"mb-0\"><li>the API configuration (endpoint: {}) is correct</li>\
             <li>the API key is valid and has quota left</li>\
             <li>the network connection is stable</li></ol>",
            escape_html(message),
            escape_html(endpoint)
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{ApiSettings, SettingsStorage};
    use std::time::Duration;
    use tempfile::TempDir;

    async fn workbench(endpoint: &str, dir: &TempDir) -> Workbench {
        let mut config = Config::default();
        config.llm.api_endpoint = endpoint.to_string();
        config.llm.api_key = "sk-test".to_string();
        let storage = SettingsStorage::with_path(dir.path().to_path_buf());
        let settings = SettingsStore::load(ApiSettings::from(&config.llm), storage).await.unwrap();
        Workbench::new(&config, settings)
    }

    fn math(operation: &str, formula: &str) -> MathRequest {
        MathRequest {
            operation: operation.to_string(),
            formula: formula.to_string(),
            variable: "x".to_string(),
            ..Default::default()
        }
    }

    async fn wait_for_explanation(bench: &Workbench, id: Uuid) -> String {
        for _ in 0..200 {
            if let Some(ExplanationState::Ready(html)) = bench.explanation(id).await {
                return html;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("explanation {} never finished", id);
    }

    #[tokio::test]
    async fn test_success_renders_result_without_explanation() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/chat").expect(0).create_async().await;
        let dir = TempDir::new().unwrap();
        let bench = workbench(&format!("{}/chat", server.url()), &dir).await;

        let response = bench.run_operation(math("diff", "x^2")).await;
        assert_eq!(response.latex.as_deref(), Some("2 x"));
        assert!(response.html.contains("\\[2 x\\]"));
        assert!(response.explanation_id.is_none());

        tokio::time::sleep(Duration::from_millis(50)).await;
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_engine_failure_requests_one_explanation() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::Regex("1/0".to_string()),
                mockito::Matcher::Regex("'simplify'".to_string()),
                mockito::Matcher::Regex("'x'".to_string()),
                mockito::Matcher::Regex("division by zero".to_string()),
                mockito::Matcher::PartialJson(serde_json::json!({"max_tokens": 300})),
            ]))
            .with_body(r#"{"choices":[{"message":{"content":"You divided by **zero**: $1/0$."}}]}"#)
            .expect(1)
            .create_async()
            .await;
        let dir = TempDir::new().unwrap();
        let bench = workbench(&format!("{}/chat", server.url()), &dir).await;

        let response = bench.run_operation(math("simplify", "1/0")).await;
        assert!(response.html.contains("error-message"));
        assert!(response.html.contains("division by zero"));
        let id = response.explanation_id.expect("explanation should be requested");

        let html = wait_for_explanation(&bench, id).await;
        assert!(html.contains("Model explanation:"));
        assert!(html.contains("<strong>zero</strong>"));
        assert!(html.contains("\\(1/0\\)"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_explanation_failure_is_reported_in_its_region() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat")
            .with_status(401)
            .with_body(r#"{"error":{"message":"bad key"}}"#)
            .expect(1)
            .create_async()
            .await;
        let dir = TempDir::new().unwrap();
        let bench = workbench(&format!("{}/chat", server.url()), &dir).await;

        let response = bench.run_operation(math("solve", "\\sin x = 0")).await;
        let id = response.explanation_id.unwrap();
        let html = wait_for_explanation(&bench, id).await;
        assert!(html.contains("401"));
        assert!(html.contains("bad key"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unknown_operation_and_validation() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/chat").expect(0).create_async().await;
        let dir = TempDir::new().unwrap();
        let bench = workbench(&format!("{}/chat", server.url()), &dir).await;

        let unknown = bench.run_operation(math("limit", "x")).await;
        assert!(unknown.html.contains("unknown operation: limit"));
        assert!(unknown.explanation_id.is_none());

        let empty = bench.run_operation(math("simplify", "")).await;
        assert!(empty.html.contains("alert-warning"));
        assert!(empty.explanation_id.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_replace_editor_and_no_solution() {
        let dir = TempDir::new().unwrap();
        let bench = workbench("http://127.0.0.1:9/chat", &dir).await;

        let mut request = math("solve", "x^2 + 1 = 0");
        request.replace_editor = true;
        request.editor = Some(crate::render::EditorBuffer::new("x^2 + 1 = 0"));
        let response = bench.run_operation(request).await;
        assert_eq!(response.latex.as_deref(), Some("\\text{no solution}"));
        let editor = response.editor.unwrap();
        assert_eq!(editor.text, "\\text{no solution}");
        assert_eq!(editor.selection_start, editor.text.chars().count());
    }

    #[tokio::test]
    async fn test_plot_partial_and_total_failure() {
        let dir = TempDir::new().unwrap();
        let bench = workbench("http://127.0.0.1:9/chat", &dir).await;

        let partial = bench
            .plot(PlotRequest {
                formulas: "x^2\n\\foo".to_string(),
                variable: "x".to_string(),
                legend: false,
                grid: true,
                axes: Default::default(),
            })
            .await;
        assert!(partial.config.is_some());
        assert!(partial.html.contains("Some functions could not be plotted:"));

        let failed = bench
            .plot(PlotRequest {
                formulas: "\\foo".to_string(),
                variable: "x".to_string(),
                legend: false,
                grid: true,
                axes: Default::default(),
            })
            .await;
        assert!(failed.config.is_none());
        assert!(failed.html.contains("Plot failed:"));
    }

    #[tokio::test]
    async fn test_ask_network_error_has_checklist() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat")
            .with_status(500)
            .with_body(r#"{"error":{"message":"overloaded"}}"#)
            .create_async()
            .await;
        let dir = TempDir::new().unwrap();
        let endpoint = format!("{}/chat", server.url());
        let bench = workbench(&endpoint, &dir).await;

        let html = bench.ask("why?", "x^2").await;
        assert!(html.contains("HTTP error! status: 500, message: overloaded"));
        assert!(html.contains(&endpoint));
        assert!(html.contains("API key is valid"));
    }

    #[test]
    fn test_preview_typesets_or_clears() {
        let settings_dir = TempDir::new().unwrap();
        let rt = tokio::runtime::Runtime::new().unwrap();
        let bench = rt.block_on(workbench("http://127.0.0.1:9/chat", &settings_dir));
        assert_eq!(bench.preview("  "), "");
        assert_eq!(bench.preview("x^2"), r#"<div class="mathjax-wrapper">\[x^2\]</div>"#);
    }
}
