use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::aggregator::SessionsView;
use crate::error::ApiError;
use crate::models::StatusView;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/status",
    description = "Gateway, agent and session summary from the cached status snapshot",
    responses(
        (status = 200, body = Object),
        (status = 500, description = "Status source unavailable", body = Object)
    ),
    tag = "Status"
)]
pub async fn status_handler(State(app): State<Arc<AppState>>) -> Result<Json<StatusView>, ApiError> {
    app.aggregator
        .status_view()
        .await
        .map(Json)
        .map_err(|_| ApiError::SourceUnavailable("status"))
}

#[utoipa::path(
    get,
    path = "/api/sessions",
    description = "Session counters and recent sessions from the status snapshot",
    responses(
        (status = 200, body = Object),
        (status = 500, description = "Status source unavailable", body = Object)
    ),
    tag = "Status"
)]
pub async fn sessions_handler(State(app): State<Arc<AppState>>) -> Result<Json<SessionsView>, ApiError> {
    app.aggregator
        .sessions_view()
        .await
        .map(Json)
        .map_err(|_| ApiError::SourceUnavailable("sessions"))
}
