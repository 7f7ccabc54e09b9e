//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Dispatch (cache hits, misses, resolution errors)
//! - Worker (conversions, stage durations, failures by kind)
//! - Notifications

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Dispatch Metrics
// =============================================================================

/// Dispatched ids by result.
pub static DISPATCH_RESULTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tubetone_dispatch_results_total", "Total dispatched video ids"),
        &["result"], // "hit", "miss", "error"
    )
    .unwrap()
});

/// Messages handed to the work queue.
pub static JOBS_ENQUEUED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("tubetone_jobs_enqueued_total", "Total jobs enqueued").unwrap()
});

// =============================================================================
// Worker Metrics
// =============================================================================

/// Jobs currently being processed.
pub static JOBS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("tubetone_jobs_in_flight", "Jobs currently being processed").unwrap()
});

/// Conversions total by outcome.
pub static CONVERSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tubetone_conversions_total", "Total conversion jobs"),
        &["outcome"], // "done", "failed", "cancelled"
    )
    .unwrap()
});

/// Failures total by kind.
pub static CONVERSION_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tubetone_conversion_failures_total",
            "Total failed conversion jobs",
        ),
        &["kind"], // "resolution", "transfer", "process"
    )
    .unwrap()
});

/// Whole job duration in seconds.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("tubetone_job_duration_seconds", "Duration of conversion jobs")
            .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["outcome"],
    )
    .unwrap()
});

/// Transcode step duration in seconds.
pub static CONVERSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tubetone_conversion_duration_seconds",
            "Duration of the transcode step",
        )
        .buckets(vec![0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &[],
    )
    .unwrap()
});

/// Length of converted source videos in seconds.
pub static VIDEO_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tubetone_video_duration_seconds",
            "Length of successfully converted videos",
        )
        .buckets(vec![30.0, 60.0, 180.0, 300.0, 600.0, 1200.0, 3600.0, 7200.0]),
        &[],
    )
    .unwrap()
});

/// Media bytes downloaded.
pub static BYTES_DOWNLOADED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tubetone_downloaded_bytes_total",
        "Total media bytes downloaded",
    )
    .unwrap()
});

// =============================================================================
// Notification Metrics
// =============================================================================

/// Snapshots published.
pub static NOTIFICATIONS_PUBLISHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tubetone_notifications_published_total",
        "Total job notifications published",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Dispatch
        Box::new(DISPATCH_RESULTS.clone()),
        Box::new(JOBS_ENQUEUED.clone()),
        // Worker
        Box::new(JOBS_IN_FLIGHT.clone()),
        Box::new(CONVERSIONS_TOTAL.clone()),
        Box::new(CONVERSION_FAILURES.clone()),
        Box::new(JOB_DURATION.clone()),
        Box::new(CONVERSION_DURATION.clone()),
        Box::new(VIDEO_DURATION.clone()),
        Box::new(BYTES_DOWNLOADED.clone()),
        // Notifications
        Box::new(NOTIFICATIONS_PUBLISHED.clone()),
    ]
}
