pub mod aggregator;
pub mod broadcast;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod router;
pub mod routes;
pub mod sources;
pub mod state;
pub mod subscribers;

#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use bollard::Docker;
use bollard::API_DEFAULT_VERSION;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast as shutdown;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::broadcast::spawn_scheduler;
use crate::config::Config;
use crate::router::build_router;
use crate::sources::{DockerRuntime, LocalHost, OpenClawCli, Sources};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let docker = match Docker::connect_with_local_defaults() {
        Ok(d) => d,
        Err(_) => {
            // Fall back to Desktop socket if DOCKER_HOST is unset
            let sock = format!("{}/.docker/desktop/docker.sock", std::env::var("HOME")?);
            Docker::connect_with_unix(&sock, 120, API_DEFAULT_VERSION)?
        }
    };
    // Containers are optional: keep serving without them.
    match tokio::time::timeout(config.docker_timeout, docker.version()).await {
        Ok(Ok(v)) => info!("Connected to Docker {:?}", v.version),
        Ok(Err(e)) => warn!(%e, "Docker unreachable, container data will be null"),
        Err(_) => warn!("Docker version check timed out, container data may be null"),
    }

    let sources = Sources {
        cli: Arc::new(OpenClawCli::new(&config.cli_bin, config.cli_timeout)),
        runtime: Arc::new(DockerRuntime::new(docker, config.docker_timeout)),
        host: Arc::new(LocalHost::new(config.host_timeout)),
    };
    let app_state = Arc::new(AppState::new(sources, &config));

    let (shutdown_tx, shutdown_rx) = shutdown::channel(1);
    let scheduler = spawn_scheduler(
        app_state.broadcaster.clone(),
        config.broadcast_interval,
        shutdown_rx,
    );

    let router = build_router(app_state.clone(), config.rate_limit);
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!("Listening on {}", config.bind_addr);

    let broadcaster = app_state.broadcaster.clone();
    let shutdown_signal = async move {
        if let Err(e) = signal::ctrl_c().await {
            warn!(?e, "failed to install Ctrl+C handler");
        }
        info!("shutdown signal received - closing HTTP server");
        let _ = shutdown_tx.send(());
        // Lets open sockets finish so the server can drain.
        broadcaster.shutdown();
    };

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await?;

    if let Err(e) = scheduler.await {
        warn!(?e, "broadcast scheduler panicked while shutting down");
    }

    info!("Mission Control terminated cleanly");
    Ok(())
}
