use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::metrics;

/// Health check endpoint - reports degraded when the hub stops answering
pub async fn health_handler(State(state): State<AppState>) -> Response {
    let snapshot = state.metrics.snapshot();
    let hub_stats = state.hub.stats().await.ok();

    let (code, status) = match hub_stats {
        Some(_) => (StatusCode::OK, "healthy"),
        None => (StatusCode::SERVICE_UNAVAILABLE, "degraded"),
    };

    let body = metrics::HealthStatus {
        status: status.to_string(),
        members: hub_stats.map(|s| s.members).unwrap_or(0),
        connections: snapshot.connections.active,
        uptime_secs: snapshot.uptime_secs,
        checked_at: chrono::Utc::now().to_rfc3339(),
    };

    (code, Json(body)).into_response()
}

/// Metrics endpoint - connection counters plus the hub's routing counters
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(metrics::MetricsReport {
        server: state.metrics.snapshot(),
        hub: state.hub.stats().await.ok(),
    })
}

/// Liveness probe - returns 200 if the server is running
pub async fn health_live_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}
