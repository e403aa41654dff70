//! Settings API Routes
//!
//! - GET /api/settings - Effective API settings (key masked)
//! - POST /api/settings - Merge and persist an override
//! - DELETE /api/settings - Drop the override, back to built-in defaults
//! - GET|POST /api/settings/theme - Read or store the theme
//! - POST /api/settings/theme/toggle - Flip the theme

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info};

use super::{SettingsOverride, SettingsResponse};
use crate::models::{AppState, ThemeRequest, ThemeResponse, ToggleThemeRequest};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/settings",
            get(get_settings).post(update_settings).delete(reset_settings),
        )
        .route("/api/settings/theme", get(get_theme).post(set_theme))
        .route("/api/settings/theme/toggle", post(toggle_theme))
        .with_state(state)
}

fn storage_error(context: &str, e: anyhow::Error) -> axum::response::Response {
    error!("{}: {}", context, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "error": context,
            "details": e.to_string()
        })),
    )
        .into_response()
}

/// GET /api/settings
async fn get_settings(State(state): State<AppState>) -> impl IntoResponse {
    let customized = state.settings.is_customized().await;
    Json(SettingsResponse::new(&state.settings.get(), customized))
}

/// POST /api/settings
async fn update_settings(
    State(state): State<AppState>,
    Json(request): Json<SettingsOverride>,
) -> impl IntoResponse {
    if request.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "success": false,
                "error": "Please fill in at least one field"
            })),
        )
            .into_response();
    }

    match state.settings.save(&request).await {
        Ok(settings) => {
            info!("Settings updated");
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "success": true,
                    "message": "Settings saved",
                    "settings": SettingsResponse::new(&settings, true)
                })),
            )
                .into_response()
        }
        Err(e) => storage_error("Failed to save settings", e),
    }
}

/// DELETE /api/settings
async fn reset_settings(State(state): State<AppState>) -> impl IntoResponse {
    match state.settings.reset().await {
        Ok(settings) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "message": "Settings reset to defaults",
                "settings": SettingsResponse::new(&settings, false)
            })),
        )
            .into_response(),
        Err(e) => storage_error("Failed to reset settings", e),
    }
}

/// GET /api/settings/theme - `null` until a theme was stored
async fn get_theme(State(state): State<AppState>) -> impl IntoResponse {
    match state.settings.theme().await {
        Ok(theme) => (StatusCode::OK, Json(ThemeResponse { theme })).into_response(),
        Err(e) => storage_error("Failed to load theme", e),
    }
}

/// POST /api/settings/theme
async fn set_theme(
    State(state): State<AppState>,
    Json(request): Json<ThemeRequest>,
) -> impl IntoResponse {
    match state.settings.set_theme(request.theme).await {
        Ok(theme) => (StatusCode::OK, Json(ThemeResponse { theme: Some(theme) })).into_response(),
        Err(e) => storage_error("Failed to save theme", e),
    }
}

/// POST /api/settings/theme/toggle
async fn toggle_theme(
    State(state): State<AppState>,
    body: Bytes,
) -> impl IntoResponse {
    // Empty or unparsable bodies mean nothing is known about the page.
    let current = serde_json::from_slice::<ToggleThemeRequest>(&body)
        .ok()
        .and_then(|r| r.current);
    match state.settings.toggle_theme(current).await {
        Ok(theme) => (StatusCode::OK, Json(ThemeResponse { theme: Some(theme) })).into_response(),
        Err(e) => storage_error("Failed to save theme", e),
    }
}
