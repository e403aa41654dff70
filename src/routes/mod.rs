//! API Routes
//!
//! HTTP endpoints of the workbench:
//! - `/` - The editor page
//! - `/api/health` - Health check
//! - `/api/preview` - Typeset preview of the editor
//! - `/api/math` - Symbolic operations
//! - `/api/explanations/{id}` - Model explanations of failed operations
//! - `/api/plot` - Function plots
//! - `/api/ask` - Free-form questions to the model
//! - `/api/settings` - API settings and theme

pub mod assistant;
pub mod health;
pub mod math;
pub mod plot;
pub mod ui;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::cors_layer;
use crate::models::AppState;
use crate::settings;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let cors = cors_layer(&state.config.server.cors_allowed_origins);

    let api_router = Router::new()
        .merge(health::router(state.clone()))
        .merge(math::router(state.clone()))
        .merge(plot::router(state.clone()))
        .merge(assistant::router(state.clone()))
        .merge(settings::router(state));

    Router::new()
        .merge(api_router)
        .merge(ui::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::settings::{ApiSettings, SettingsStorage, SettingsStore};
    use crate::workbench::Workbench;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn app(dir: &TempDir) -> Router {
        let mut config = Config::default();
        config.llm.api_endpoint = "http://127.0.0.1:9/chat".to_string();
        let storage = SettingsStorage::with_path(dir.path().to_path_buf());
        let settings = SettingsStore::load(ApiSettings::from(&config.llm), storage).await.unwrap();
        let workbench = Arc::new(Workbench::new(&config, settings.clone()));
        create_router(AppState { config, settings, workbench })
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health_and_page() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let (status, body) = send(&app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["typesetting"], true);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_math_endpoint() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/math",
            Some(json!({"operation": "solve", "formula": "x^2 = 4", "variable": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["latex"], "x = -2, x = 2");
        assert!(body.get("explanationId").is_none());

        let (status, body) = send(
            &app,
            "POST",
            "/api/math",
            Some(json!({"operation": "substitute", "formula": "x + y", "parameter": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["html"].as_str().unwrap().contains("alert-warning"));
    }

    #[tokio::test]
    async fn test_failure_explanation_without_key() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let (_, body) = send(
            &app,
            "POST",
            "/api/math",
            Some(json!({"operation": "simplify", "formula": "1/0"})),
        )
        .await;
        let id = body["explanationId"].as_str().unwrap().to_string();

        let mut last = Value::Null;
        for _ in 0..100 {
            let (_, body) = send(&app, "GET", &format!("/api/explanations/{}", id), None).await;
            if body["status"] != "pending" {
                last = body;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(last["status"], "ready");
        assert!(last["html"].as_str().unwrap().contains("API configuration is incomplete"));

        let (_, body) = send(&app, "GET", &format!("/api/explanations/{}", id), None).await;
        assert_eq!(body["status"], "gone");
    }

    #[tokio::test]
    async fn test_preview_and_plot() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let (_, body) = send(&app, "POST", "/api/preview", Some(json!({"latex": ""}))).await;
        assert_eq!(body["html"], "");

        let (_, body) = send(
            &app,
            "POST",
            "/api/plot",
            Some(json!({"formulas": "x^2\n\\sin x", "variable": "x", "legend": true})),
        )
        .await;
        assert_eq!(body["config"]["data"].as_array().unwrap().len(), 2);
        assert_eq!(body["config"]["xAxis"]["domain"], json!([-10.0, 10.0]));
    }

    #[tokio::test]
    async fn test_ask_without_key_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let (status, body) = send(&app, "POST", "/api/ask", Some(json!({"query": "hi"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["html"].as_str().unwrap().contains("API configuration is incomplete"));
    }

    #[tokio::test]
    async fn test_settings_lifecycle() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let (status, body) = send(&app, "POST", "/api/settings", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, body) = send(
            &app,
            "POST",
            "/api/settings",
            Some(json!({"apiKey": "sk-abcdef1234"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["settings"]["hasKey"], true);
        assert_eq!(body["settings"]["apiEndpoint"], "http://127.0.0.1:9/chat");

        let (_, body) = send(&app, "GET", "/api/settings", None).await;
        assert_eq!(body["customized"], true);
        assert!(body.get("apiKey").is_none());

        let (_, body) = send(&app, "DELETE", "/api/settings", None).await;
        assert_eq!(body["message"], "Settings reset to defaults");
        assert_eq!(body["settings"]["hasKey"], false);
    }

    #[tokio::test]
    async fn test_theme_endpoints() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let (_, body) = send(&app, "GET", "/api/settings/theme", None).await;
        assert_eq!(body["theme"], Value::Null);

        let (_, body) = send(&app, "POST", "/api/settings/theme/toggle", Some(json!({"current": "dark"}))).await;
        assert_eq!(body["theme"], "light");

        let (_, body) = send(&app, "POST", "/api/settings/theme/toggle", None).await;
        assert_eq!(body["theme"], "dark");

        let (_, body) = send(&app, "POST", "/api/settings/theme", Some(json!({"theme": "light"}))).await;
        assert_eq!(body["theme"], "light");
    }
}
