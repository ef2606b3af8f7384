use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::error::ApiError;
use crate::models::ContainerDescriptor;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/containers",
    description = "All containers, running and stopped",
    responses(
        (status = 200, body = Object),
        (status = 500, description = "Container runtime unreachable", body = Object)
    ),
    tag = "Containers"
)]
pub async fn list_containers_handler(
    State(app): State<Arc<AppState>>,
) -> Result<Json<Vec<ContainerDescriptor>>, ApiError> {
    tracing::debug!("listing containers");

    app.aggregator
        .containers()
        .await
        .map(|list| Json((*list).clone()))
        .map_err(|_| ApiError::SourceUnavailable("containers"))
}
