use axum::Json;
use serde_json::{json, Value};

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, body = Object)),
    tag = "Health"
)]
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "mission-control" }))
}
