//! ewm-admission server entry point.
//!
//! Starts the Axum HTTP server with the participation request and event
//! lifecycle endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use ewm_admission::api;
use ewm_admission::app_state::{AppState, Backends};
use ewm_admission::config::ServiceConfig;
use ewm_admission::domain::SystemClock;
use ewm_admission::persistence::memory::MemoryStore;
use ewm_admission::persistence::postgres::PostgresStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = ServiceConfig::from_env().context("invalid LISTEN_ADDR")?;
    tracing::info!(addr = %config.listen_addr, "starting ewm-admission");

    // Select persistence backend
    let backends = if config.persistence_enabled {
        let store = PostgresStore::connect(&config)
            .await
            .context("failed to open the database")?;
        Backends::postgres(&Arc::new(store))
    } else {
        tracing::warn!("persistence disabled, data lives in memory only");
        Backends::in_memory(&Arc::new(MemoryStore::new()))
    };

    // Build application state
    let app_state = AppState::new(
        backends,
        Arc::new(SystemClock),
        config.admission_lock_timeout(),
        config.lifecycle_policy(),
    );

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
