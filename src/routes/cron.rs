use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::aggregator::HeartbeatView;
use crate::error::ApiError;
use crate::models::{CronJob, CronRun};
use crate::state::AppState;

const DEFAULT_RUNS: u32 = 20;

#[derive(Debug, Serialize)]
pub struct CronJobs {
    pub count: usize,
    pub jobs: Vec<CronJob>,
}

#[derive(Debug, Serialize)]
pub struct CronRuns {
    pub count: usize,
    pub runs: Vec<CronRun>,
}

#[derive(Debug, Deserialize, Default, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CronRunsQuery {
    /// 1..=200, default 20.
    #[param(required = false)]
    limit: Option<u32>,
}

#[utoipa::path(
    get,
    path = "/api/cron",
    description = "Per-agent heartbeat schedules",
    responses(
        (status = 200, body = Object),
        (status = 500, body = Object)
    ),
    tag = "Cron"
)]
pub async fn heartbeat_handler(State(app): State<Arc<AppState>>) -> Result<Json<HeartbeatView>, ApiError> {
    app.aggregator
        .heartbeat()
        .await
        .map(Json)
        .map_err(|_| ApiError::SourceUnavailable("cron info"))
}

#[utoipa::path(
    get,
    path = "/api/cron/jobs",
    responses(
        (status = 200, body = Object),
        (status = 500, body = Object)
    ),
    tag = "Cron"
)]
pub async fn cron_jobs_handler(State(app): State<Arc<AppState>>) -> Result<Json<CronJobs>, ApiError> {
    let jobs = app
        .aggregator
        .cron_jobs()
        .await
        .map_err(|_| ApiError::SourceUnavailable("cron jobs"))?;

    Ok(Json(CronJobs {
        count: jobs.len(),
        jobs: (*jobs).clone(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/cron/runs",
    params(CronRunsQuery),
    responses(
        (status = 200, body = Object),
        (status = 500, body = Object)
    ),
    tag = "Cron"
)]
pub async fn cron_runs_handler(
    State(app): State<Arc<AppState>>,
    Query(q): Query<CronRunsQuery>,
) -> Result<Json<CronRuns>, ApiError> {
    let runs = app
        .aggregator
        .cron_runs(q.limit.unwrap_or(DEFAULT_RUNS))
        .await
        .map_err(|_| ApiError::SourceUnavailable("cron runs"))?;

    Ok(Json(CronRuns {
        count: runs.len(),
        runs: (*runs).clone(),
    }))
}
