//! # HTTP Server
//!
//! HTTP server for the logging endpoints, metrics, and probes.
//!
//! Provides endpoints:
//! - `/api/TestLogging` (GET, POST) - writes one line per log level and returns a welcome message
//! - `/api/GenerateLogs` (GET) - writes one line per log level and returns an empty 200
//! - `/metrics` - Prometheus metrics in text format
//! - `/healthz` - Liveness probe (always returns 200)
//! - `/readyz` - Readiness probe (returns 200 once the listener is bound)
//!
//! The server runs on port 7071 by default. `--port` or `VAULT_SERVICES_PORT`
//! takes precedence over `PORT`.

use crate::constants::LOG_METRIC_VALUE;
use crate::observability::metrics;
use crate::services::VaultServices;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Body returned by `/api/TestLogging`
pub const WELCOME_MESSAGE: &str = "Welcome to Azure Functions!";

#[derive(Debug)]
pub struct ServerState {
    pub is_ready: Arc<AtomicBool>,
    pub enable_metrics: bool,
    /// Vault services, absent when configuration has no usable vault
    pub vault: Option<Arc<VaultServices>>,
}

impl ServerState {
    #[must_use]
    pub fn new(enable_metrics: bool) -> Self {
        Self {
            is_ready: Arc::new(AtomicBool::new(false)),
            enable_metrics,
            vault: None,
        }
    }

    #[must_use]
    pub fn with_vault(mut self, vault: VaultServices) -> Self {
        self.vault = Some(Arc::new(vault));
        self
    }
}

/// Build the router without binding a listener
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/api/TestLogging", get(test_logging_handler).post(test_logging_handler))
        .route("/api/GenerateLogs", get(generate_logs_handler))
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `0.0.0.0:{port}` and serve until Ctrl-C
///
/// # Errors
/// Returns an error if the port cannot be bound or the server fails
pub async fn start_server(port: u16, state: Arc<ServerState>) -> Result<(), anyhow::Error> {
    let app = router(state.clone());

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;

    info!("HTTP server listening on {}", addr);
    state.is_ready.store(true, Ordering::Relaxed);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.is_ready.store(false, Ordering::Relaxed);
    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

/// One line per level; tracing has no critical level so it is an error tagged `critical`
fn write_log_levels() {
    debug!("Logging Debug");
    metrics::log_metric("Logging metric", LOG_METRIC_VALUE);
    info!("Logging information");
    warn!("Logging warning");
    error!("Logging error");
    error!(critical = true, "Logging critical");
}

async fn test_logging_handler() -> impl IntoResponse {
    write_log_levels();
    (StatusCode::OK, WELCOME_MESSAGE)
}

async fn generate_logs_handler() -> impl IntoResponse {
    write_log_levels();
    StatusCode::OK
}

async fn metrics_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    if !state.enable_metrics {
        return (
            StatusCode::NOT_FOUND,
            [("content-type", "text/plain")],
            String::new(),
        );
    }

    match metrics::encode_text() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        ),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {e}"),
            )
        }
    }
}

async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    if state.is_ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
