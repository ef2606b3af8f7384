use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::{SessionEntry, SessionList};
use crate::state::AppState;

const DEFAULT_ACTIVE_MINUTES: u32 = 60;

#[derive(Debug, Deserialize, Default, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SessionListQuery {
    /// Only sessions updated within this many minutes.
    #[param(required = false)]
    active: Option<u32>,
}

#[derive(Debug, Deserialize, Default, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActiveSessionsQuery {
    #[param(required = false)]
    minutes: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSessions {
    pub count: u64,
    pub active_minutes: Option<u32>,
    pub sessions: Vec<SessionEntry>,
}

#[utoipa::path(
    get,
    path = "/api/sessions/list",
    params(SessionListQuery),
    responses(
        (status = 200, body = Object),
        (status = 500, description = "Session list unavailable", body = Object)
    ),
    tag = "Sessions"
)]
pub async fn session_list_handler(
    State(app): State<Arc<AppState>>,
    Query(q): Query<SessionListQuery>,
) -> Result<Json<SessionList>, ApiError> {
    app.aggregator
        .session_list(q.active)
        .await
        .map(|list| Json((*list).clone()))
        .map_err(|_| ApiError::SourceUnavailable("sessions"))
}

#[utoipa::path(
    get,
    path = "/api/sessions/active",
    params(ActiveSessionsQuery),
    description = "Sessions active within the last `minutes` (default 60)",
    responses(
        (status = 200, body = Object),
        (status = 500, description = "Session list unavailable", body = Object)
    ),
    tag = "Sessions"
)]
pub async fn active_sessions_handler(
    State(app): State<Arc<AppState>>,
    Query(q): Query<ActiveSessionsQuery>,
) -> Result<Json<ActiveSessions>, ApiError> {
    let minutes = q.minutes.unwrap_or(DEFAULT_ACTIVE_MINUTES);
    let list = app
        .aggregator
        .session_list(Some(minutes))
        .await
        .map_err(|_| ApiError::SourceUnavailable("active sessions"))?;

    Ok(Json(ActiveSessions {
        count: list.count,
        active_minutes: list.active_minutes,
        sessions: list.sessions.clone(),
    }))
}
