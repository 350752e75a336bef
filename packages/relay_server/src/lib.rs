// Library interface for relay_server
// Exposes the router so the binary and the integration tests build the same app

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod ws;

use axum::{Router, routing::get};
use relay_hub::{HubHandle, SessionConfig};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::{MakeSpan, TraceLayer};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::metrics::ServerMetrics;

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub server_config: Arc<ServerConfig>,
    pub session_config: Arc<SessionConfig>,
    /// Server metrics for observability
    pub metrics: Arc<ServerMetrics>,
}

/// Build the HTTP app: chat socket, health endpoints and static assets.
pub fn build_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.server_config.static_dir);

    Router::new()
        .route("/ws", get(handlers::chat_websocket_handler))
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
