use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::plot::PlotConfig;
use crate::render::EditorBuffer;
use crate::settings::{SettingsStore, Theme};
use crate::workbench::Workbench;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub settings: SettingsStore,
    pub workbench: Arc<Workbench>,
}

// Request and response bodies of the JSON API

#[derive(Debug, Clone, serde::Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub latex: String,
}

/// Any response whose payload is one rendered region.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RegionResponse {
    pub html: String,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct MathRequest {
    pub operation: String,
    #[serde(default)]
    pub formula: String,
    #[serde(default)]
    pub variable: String,
    /// `var=value` for substitute and evaluate.
    #[serde(default)]
    pub parameter: Option<String>,
    /// Clear the editor and put the result at the cursor.
    #[serde(rename = "replaceEditor", default)]
    pub replace_editor: bool,
    #[serde(default)]
    pub editor: Option<EditorBuffer>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MathResponse {
    pub html: String,
    /// LaTeX shown in the region on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latex: Option<String>,
    /// Poll `/api/explanations/{id}` for the model's take on a failure.
    #[serde(rename = "explanationId", skip_serializing_if = "Option::is_none")]
    pub explanation_id: Option<Uuid>,
    /// New editor content when `replaceEditor` was set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor: Option<EditorBuffer>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PlotResponse {
    /// Failure block, or warnings shown beneath the chart.
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<PlotConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub svg: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub latex: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ExplanationResponse {
    pub status: String, // "pending" or "ready"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ThemeRequest {
    pub theme: Theme,
}

#[derive(Debug, Clone, serde::Deserialize, Default)]
pub struct ToggleThemeRequest {
    /// Theme the page currently shows, used when nothing is stored yet.
    #[serde(default)]
    pub current: Option<Theme>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ThemeResponse {
    pub theme: Option<Theme>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub typesetting: bool,
}
