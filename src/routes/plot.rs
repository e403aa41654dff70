use axum::{extract::State, response::Json as ResponseJson, routing::post, Json, Router};
use tracing::info;

use crate::models::{AppState, PlotResponse};
use crate::plot::PlotRequest;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/plot", post(plot))
        .with_state(state)
}

async fn plot(
    State(state): State<AppState>,
    Json(request): Json<PlotRequest>,
) -> ResponseJson<PlotResponse> {
    info!(lines = request.formulas.lines().count(), "Plot request");
    Json(state.workbench.plot(request).await)
}
