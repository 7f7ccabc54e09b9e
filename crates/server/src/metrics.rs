//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the tubetone server:
//! - HTTP request metrics (latency, counts)
//! - WebSocket connection metrics
//! - Queue depth and worker pool occupancy (collected dynamically)
//!
//! Dispatch, conversion and notification metrics come from `tubetone_core::metrics`
//! and are registered here as well.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;
use tracing::warn;
use tubetone_core::JobQueue;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tubetone_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tubetone_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tubetone_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Terminate requests received.
pub static TERMINATE_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tubetone_terminate_requests_total",
        "Total terminate requests",
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Active WebSocket connections.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tubetone_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

/// Total WebSocket connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tubetone_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

/// WebSocket messages sent, by how they were routed.
pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tubetone_ws_messages_sent_total", "WebSocket messages sent"),
        &["route"], // "broadcast", "session"
    )
    .unwrap()
});

/// WebSocket lag events (when client falls behind).
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tubetone_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .unwrap()
});

// =============================================================================
// Queue and Pool Metrics (collected dynamically)
// =============================================================================

/// Messages waiting in the work queue.
pub static QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("tubetone_queue_depth", "Messages waiting in the work queue").unwrap()
});

/// Worker pool slots in use.
pub static WORKER_POOL_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tubetone_worker_pool_active",
        "Number of worker pool slots in use",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(TERMINATE_REQUESTS.clone()))
        .unwrap();

    // WebSocket
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_MESSAGES_SENT.clone()))
        .unwrap();
    registry.register(Box::new(WS_LAG_EVENTS.clone())).unwrap();

    // Queue and pool
    registry.register(Box::new(QUEUE_DEPTH.clone())).unwrap();
    registry
        .register(Box::new(WORKER_POOL_ACTIVE.clone()))
        .unwrap();

    // Core metrics (dispatch, worker, notifications)
    for metric in tubetone_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Refresh gauges that mirror live component state.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    QUEUE_DEPTH.set(state.queue().len() as i64);
    WORKER_POOL_ACTIVE.set(state.pool().active() as i64);
}

static UUID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

static FILES_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/files/.+$").unwrap());

/// Normalize a path for metric labels.
///
/// Artifact downloads collapse to a single label so every cached file does
/// not become its own time series.
pub fn normalize_path(path: &str) -> String {
    let result = FILES_REGEX.replace(path, "/files/{key}");
    let result = UUID_REGEX.replace_all(&result, "{id}");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_files() {
        let path = "/files/abc123/Daft%20Punk%20-%20One%20More%20Time.mp3";
        assert_eq!(normalize_path(path), "/files/{key}");
    }

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/jobs/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/jobs/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/api/v1/enqueue"), "/api/v1/enqueue");
        assert_eq!(normalize_path("/files"), "/files");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("tubetone_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        QUEUE_DEPTH.set(0);
        WORKER_POOL_ACTIVE.set(0);
        WS_CONNECTIONS_TOTAL.inc();
        tubetone_core::metrics::JOBS_ENQUEUED.inc();
        tubetone_core::metrics::DISPATCH_RESULTS
            .with_label_values(&["hit"])
            .inc();

        let output = encode_metrics();

        assert!(output.contains("tubetone_queue_depth"));
        assert!(output.contains("tubetone_worker_pool_active"));
        assert!(output.contains("tubetone_ws_connections_total"));
        assert!(output.contains("tubetone_jobs_enqueued_total"));
        assert!(output.contains("tubetone_dispatch_results_total"));
    }
}
