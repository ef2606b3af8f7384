use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Non-fatal outcome of a source adapter.
///
/// Never crosses the aggregator boundary as a hard failure: the affected
/// field degrades to `null`/empty and the reason is logged.
#[derive(Debug, Error)]
pub enum Unavailable {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to spawn: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("exited with {status}: {stderr}")]
    ExitStatus { status: String, stderr: String },

    #[error("malformed output: {0}")]
    Parse(String),

    #[error("container runtime error: {0}")]
    Runtime(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for Unavailable {
    fn from(err: serde_json::Error) -> Self {
        Unavailable::Parse(err.to_string())
    }
}

impl From<bollard::errors::Error> for Unavailable {
    fn from(err: bollard::errors::Error) -> Self {
        Unavailable::Runtime(err.to_string())
    }
}

/// Errors surfaced by the HTTP accessors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The only source behind an endpoint produced nothing usable.
    #[error("Failed to get {0}")]
    SourceUnavailable(&'static str),

    #[error("too many connections: limit is {0}")]
    TooManyConnections(usize),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::SourceUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::TooManyConnections(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
