//! Upload Key Service - Main Application Entry Point
//!
//! This is a REST API server that issues short-lived upload keys and purges
//! expired ones from the store. Keys are random 8-character strings over an
//! uppercase alphanumeric alphabet; each issued key is persisted with its
//! requester and an expiry one retention window in the future.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Cleanup**: background reaper deleting expired records in bounded batches
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Wire the generator, store, issuer, and reaper
//! 5. Spawn the periodic sweep task
//! 6. Start server on configured port

mod config;
mod db;
mod error;
mod handlers;
mod models;
mod services;
mod store;
mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::services::{generator::KeyGenerator, issuer::KeyIssuer, reaper::ExpiryReaper};
use crate::store::{KeyStore, PgKeyStore};
use crate::telemetry::{ErrorReporter, LogReporter};

/// Shared application state handed to every handler via State extraction.
#[derive(Clone)]
pub struct AppState {
    pub pool: db::DbPool,
    pub issuer: Arc<KeyIssuer>,
    pub reaper: Arc<ExpiryReaper>,
    pub reporter: Arc<dyn ErrorReporter>,
    /// Cancelled on shutdown; also stops in-flight sweeps
    pub shutdown: CancellationToken,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    if config.batch_cap == 0 {
        anyhow::bail!("BATCH_CAP must be at least 1");
    }
    tracing::info!("Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    // Wire the core components; all configuration is passed in here, no
    // module reads the environment on its own
    let generator = KeyGenerator::new(&config.key_alphabet, config.key_length)?;
    let store: Arc<dyn KeyStore> = Arc::new(PgKeyStore::new(pool.clone(), config.batch_cap));
    let reporter: Arc<dyn ErrorReporter> = Arc::new(LogReporter);

    let issuer = Arc::new(KeyIssuer::new(
        store.clone(),
        generator,
        chrono::Duration::days(config.retention_days),
    ));
    let reaper = Arc::new(ExpiryReaper::new(
        store,
        reporter.clone(),
        config.batch_cap,
    ));

    let shutdown = CancellationToken::new();

    // Periodic sweeps run until shutdown; the HTTP trigger can force one in between
    tokio::spawn(reaper.clone().run(
        Duration::from_secs(config.sweep_interval_secs),
        shutdown.clone(),
    ));

    let state = AppState {
        pool,
        issuer,
        reaper,
        reporter,
        shutdown: shutdown.clone(),
    };

    let app = Router::new()
        .route("/api/v1/keys", post(handlers::keys::issue_key))
        .route("/api/v1/sweep", post(handlers::sweep::trigger_sweep))
        .route("/health", get(handlers::health::health_check))
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Stops the reaper loop and any in-flight sweep
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

/// Resolves when the process receives ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
