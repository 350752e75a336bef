//! Server metrics for observability
//!
//! Connection-level counters. Routing counters live in the hub and are
//! reported alongside these by the `/metrics` endpoint.

use relay_hub::{HubStats, SessionEnd, SessionSummary};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    /// Currently open WebSocket connections
    pub active_connections: AtomicU64,
    /// Total connections since server start
    pub total_connections: AtomicU64,

    // Frame metrics
    /// Text frames received from clients
    pub frames_received: AtomicU64,
    /// Frames that did not decode as an envelope
    pub frames_ignored: AtomicU64,

    // Disconnect reasons
    pub closed_by_peer: AtomicU64,
    pub idle_timeouts: AtomicU64,
    pub read_errors: AtomicU64,
    pub hub_unavailable: AtomicU64,

    /// Server start time (for uptime calculation)
    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished session.
    pub fn connection_closed(&self, summary: &SessionSummary) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
        self.frames_received
            .fetch_add(summary.frames_received, Ordering::Relaxed);
        self.frames_ignored
            .fetch_add(summary.frames_ignored, Ordering::Relaxed);

        let reason = match summary.end {
            SessionEnd::Closed => &self.closed_by_peer,
            SessionEnd::IdleTimeout => &self.idle_timeouts,
            SessionEnd::ReadError => &self.read_errors,
            SessionEnd::HubStopped => &self.hub_unavailable,
        };
        reason.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
            },
            frames: FrameMetrics {
                received: self.frames_received.load(Ordering::Relaxed),
                ignored: self.frames_ignored.load(Ordering::Relaxed),
            },
            disconnects: DisconnectMetrics {
                closed_by_peer: self.closed_by_peer.load(Ordering::Relaxed),
                idle_timeouts: self.idle_timeouts.load(Ordering::Relaxed),
                read_errors: self.read_errors.load(Ordering::Relaxed),
                hub_unavailable: self.hub_unavailable.load(Ordering::Relaxed),
            },
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub frames: FrameMetrics,
    pub disconnects: DisconnectMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMetrics {
    pub received: u64,
    pub ignored: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisconnectMetrics {
    pub closed_by_peer: u64,
    pub idle_timeouts: u64,
    pub read_errors: u64,
    pub hub_unavailable: u64,
}

/// Body of `/metrics`
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub server: MetricsSnapshot,
    /// None when the hub did not answer
    pub hub: Option<HubStats>,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub members: usize,
    pub connections: u64,
    pub uptime_secs: u64,
    pub checked_at: String,
}
