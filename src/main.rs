//! slot-swapper server entry point.
//!
//! Starts the Axum HTTP server with the REST endpoints and, when enabled,
//! the PostgreSQL negotiation log.

use anyhow::Context;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use slot_swapper::api;
use slot_swapper::app_state::AppState;
use slot_swapper::config::{AppConfig, LogFormat};
use slot_swapper::persistence::{self, PostgresEventLog};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env().context("invalid configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting slot-swapper");

    // Build domain and service layers
    let app_state = AppState::from_config(&config);

    // Start the negotiation log
    if config.persistence_enabled {
        let log = PostgresEventLog::connect(&config)
            .await
            .context("failed to open negotiation log")?;
        persistence::spawn_log_writer(log.clone(), &app_state.event_bus);
        persistence::spawn_cleanup(log, config.cleanup_after_days, persistence::CLEANUP_INTERVAL);
        tracing::info!("negotiation log enabled");
    }

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
