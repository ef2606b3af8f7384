use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::GovernorLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::config::RateLimit;
use crate::routes::agents::{agents_handler, configured_agents_handler};
use crate::routes::containers_list::list_containers_handler;
use crate::routes::cron::{cron_jobs_handler, cron_runs_handler, heartbeat_handler};
use crate::routes::health::health_handler;
use crate::routes::live_ws::live_ws_handler;
use crate::routes::metrics::metrics_handler;
use crate::routes::sessions::{active_sessions_handler, session_list_handler};
use crate::routes::status::{sessions_handler, status_handler};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(description = "Mission Control dashboard API"),
    paths(
        crate::routes::status::status_handler,
        crate::routes::status::sessions_handler,
        crate::routes::sessions::session_list_handler,
        crate::routes::sessions::active_sessions_handler,
        crate::routes::agents::agents_handler,
        crate::routes::agents::configured_agents_handler,
        crate::routes::metrics::metrics_handler,
        crate::routes::containers_list::list_containers_handler,
        crate::routes::cron::heartbeat_handler,
        crate::routes::cron::cron_jobs_handler,
        crate::routes::cron::cron_runs_handler,
        crate::routes::live_ws::live_ws_handler,
        crate::routes::health::health_handler
    )
)]
struct ApiDoc;

/// Rate limiting needs the peer address, so serve the result with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub(crate) fn build_router(app: Arc<AppState>, rate_limit: Option<RateLimit>) -> Router {
    let mut api = Router::new()
        .route("/api/status", get(status_handler))
        .route("/api/sessions", get(sessions_handler))
        .route("/api/sessions/list", get(session_list_handler))
        .route("/api/sessions/active", get(active_sessions_handler))
        .route("/api/agents", get(agents_handler))
        .route("/api/agents/configured", get(configured_agents_handler))
        .route("/api/metrics", get(metrics_handler))
        .route("/api/containers", get(list_containers_handler))
        .route("/api/cron", get(heartbeat_handler))
        .route("/api/cron/jobs", get(cron_jobs_handler))
        .route("/api/cron/runs", get(cron_runs_handler));

    if let Some(limit) = rate_limit {
        let governor_conf = GovernorConfigBuilder::default()
            .per_millisecond(limit.replenish_ms)
            .burst_size(limit.burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish();

        match governor_conf {
            Some(config) => {
                api = api.layer(GovernorLayer {
                    config: Arc::new(config),
                });
            }
            None => tracing::warn!(?limit, "invalid rate limit, serving without one"),
        }
    }

    Router::new()
        .merge(api)
        .route("/ws", get(live_ws_handler))
        .route("/health", get(health_handler))
        .with_state(app)
        .merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger")
                .url("/api/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
