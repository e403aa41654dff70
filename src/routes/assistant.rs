use axum::{extract::State, response::Json as ResponseJson, routing::post, Json, Router};

use crate::models::{AppState, AskRequest, RegionResponse};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/ask", post(ask))
        .with_state(state)
}

/// POST /api/ask - free-form question about the editor content
async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> ResponseJson<RegionResponse> {
    Json(RegionResponse {
        html: state.workbench.ask(&request.query, &request.latex).await,
    })
}
