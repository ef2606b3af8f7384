use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::Value;

use crate::error::ApiError;
use crate::models::AgentProfile;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/agents",
    description = "Agents reported by the status snapshot",
    responses(
        (status = 200, body = Object),
        (status = 500, body = Object)
    ),
    tag = "Agents"
)]
pub async fn agents_handler(State(app): State<Arc<AppState>>) -> Result<Json<Vec<Value>>, ApiError> {
    app.aggregator
        .agents()
        .await
        .map(Json)
        .map_err(|_| ApiError::SourceUnavailable("agents"))
}

#[utoipa::path(
    get,
    path = "/api/agents/configured",
    description = "Agents as configured on disk, with workspace and model",
    responses(
        (status = 200, body = Object),
        (status = 500, body = Object)
    ),
    tag = "Agents"
)]
pub async fn configured_agents_handler(
    State(app): State<Arc<AppState>>,
) -> Result<Json<Vec<AgentProfile>>, ApiError> {
    app.aggregator
        .configured_agents()
        .await
        .map(|agents| Json((*agents).clone()))
        .map_err(|_| ApiError::SourceUnavailable("configured agents"))
}
