//! Editor preview, symbolic operations and failure-explanation polling.

use axum::{
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::llm::ExplanationState;
use crate::models::{AppState, ExplanationResponse, MathRequest, MathResponse, PreviewRequest, RegionResponse};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/preview", post(preview))
        .route("/api/math", post(run_operation))
        .route("/api/explanations/{id}", get(get_explanation))
        .with_state(state)
}

async fn preview(
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> ResponseJson<RegionResponse> {
    Json(RegionResponse {
        html: state.workbench.preview(&request.latex),
    })
}

async fn run_operation(
    State(state): State<AppState>,
    Json(request): Json<MathRequest>,
) -> ResponseJson<MathResponse> {
    Json(state.workbench.run_operation(request).await)
}

/// `gone` once the result was handed out or the id never existed.
async fn get_explanation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ResponseJson<ExplanationResponse> {
    let response = match state.workbench.explanation(id).await {
        Some(ExplanationState::Pending) => ExplanationResponse {
            status: "pending".to_string(),
            html: None,
        },
        Some(ExplanationState::Ready(html)) => ExplanationResponse {
            status: "ready".to_string(),
            html: Some(html),
        },
        None => ExplanationResponse {
            status: "gone".to_string(),
            html: None,
        },
    };
    Json(response)
}
