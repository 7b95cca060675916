//! Axum-based HTTP server for simulation snapshots.
//!
//! Provides REST endpoints for:
//! - GET `/api/tick/full` - Every train, track, switch and sensor
//! - GET `/api/tick/delta` - Only what changed since the last snapshot
//!
//! Both clear the dirty flags of what they return, so a renderer should ask
//! for one full snapshot and then poll deltas.

use std::net::SocketAddr;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::ServerConfig;
use crate::snapshot::TickPayload;

use super::api::ApiResponse;
use super::shared::{ServiceError, SimulationHandle};

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /api/tick/full - Full snapshot
async fn tick_full(State(handle): State<SimulationHandle>) -> impl IntoResponse {
    snapshot(&handle, false).await
}

/// GET /api/tick/delta - Delta snapshot
async fn tick_delta(State(handle): State<SimulationHandle>) -> impl IntoResponse {
    snapshot(&handle, true).await
}

async fn snapshot(
    handle: &SimulationHandle,
    delta: bool,
) -> (StatusCode, Json<ApiResponse<TickPayload>>) {
    match handle.snapshot(delta).await {
        Ok(payload) => (StatusCode::OK, Json(ApiResponse::ok(payload))),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::err(e.to_string())),
        ),
    }
}

/// Fallback handler for 404
async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::err("Not found")),
    )
}

// ============================================================================
// Server Builder
// ============================================================================

/// Configuration for the web server
#[derive(Debug, Clone)]
pub struct WebServerConfig {
    /// Address to bind to
    pub addr: SocketAddr,
    /// Whether to enable CORS for all origins
    pub cors_permissive: bool,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

impl WebServerConfig {
    /// Create a new config with the given address
    pub fn new(addr: impl Into<SocketAddr>) -> Self {
        Self {
            addr: addr.into(),
            ..Default::default()
        }
    }

    /// Set whether CORS should be permissive
    pub fn cors(mut self, permissive: bool) -> Self {
        self.cors_permissive = permissive;
        self
    }

    /// Create from the shared server configuration
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            addr: ([0, 0, 0, 0], config.web_port).into(),
            cors_permissive: config.cors_permissive,
        }
    }
}

/// Build the Axum router with all routes
pub fn build_router(handle: SimulationHandle, config: &WebServerConfig) -> Router {
    let mut router = Router::new()
        .route("/api/tick/full", get(tick_full))
        .route("/api/tick/delta", get(tick_delta))
        .fallback(not_found)
        .with_state(handle);

    if config.cors_permissive {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}

/// Start the web server
///
/// Runs until the listener fails.
pub async fn run_server(
    handle: SimulationHandle,
    config: WebServerConfig,
) -> Result<(), ServiceError> {
    let router = build_router(handle, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, "web server listening");

    axum::serve(listener, router).await?;
    Ok(())
}
