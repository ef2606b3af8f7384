use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::models::MetricsPayload;
use crate::state::AppState;

/// Never fails: an unavailable part is `null`.
#[utoipa::path(
    get,
    path = "/api/metrics",
    description = "Host, disk and per-container metrics",
    responses((status = 200, body = Object)),
    tag = "Metrics"
)]
pub async fn metrics_handler(State(app): State<Arc<AppState>>) -> Json<MetricsPayload> {
    Json(app.aggregator.metrics().await)
}
