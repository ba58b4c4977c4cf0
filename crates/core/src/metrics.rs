//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Download pool (submissions, dispatches, outcomes, durations)
//! - Orchestrator (resolutions, settings changes)
//! - External services (Spotify)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Download Pool Metrics
// =============================================================================

/// Jobs accepted by a download pool.
pub static DOWNLOADS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tunefetch_downloads_submitted_total",
        "Total download jobs submitted",
    )
    .unwrap()
});

/// Jobs handed to the downloader.
pub static DOWNLOADS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("tunefetch_downloads_started_total", "Total downloads started").unwrap()
});

/// Finished jobs by result.
pub static DOWNLOADS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tunefetch_downloads_finished_total",
            "Total download jobs reaching a terminal state",
        ),
        &["result"], // "completed", "metadata_only", "failed", "cancelled"
    )
    .unwrap()
});

/// Download duration in seconds.
pub static DOWNLOAD_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("tunefetch_download_duration_seconds", "Duration of downloads")
            .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

// =============================================================================
// Orchestrator Metrics
// =============================================================================

/// Work item resolutions by source and result.
pub static RESOLUTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tunefetch_resolutions_total",
            "Total song resolutions into work items",
        ),
        &["source", "result"], // source: "query", "url", "object"
    )
    .unwrap()
});

/// Settings changes by result.
pub static SETTINGS_CHANGES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tunefetch_settings_changes_total", "Total settings changes"),
        &["result"], // "applied", "pool_replaced", "rejected", "conflict"
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// External service request duration.
pub static EXTERNAL_SERVICE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tunefetch_external_service_duration_seconds",
            "Duration of external service calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["service", "operation"],
    )
    .unwrap()
});

/// External service requests total.
pub static EXTERNAL_SERVICE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tunefetch_external_service_requests_total",
            "Total external service requests",
        ),
        &["service", "operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Download pool
        Box::new(DOWNLOADS_SUBMITTED.clone()),
        Box::new(DOWNLOADS_STARTED.clone()),
        Box::new(DOWNLOADS_FINISHED.clone()),
        Box::new(DOWNLOAD_DURATION.clone()),
        // Orchestrator
        Box::new(RESOLUTIONS_TOTAL.clone()),
        Box::new(SETTINGS_CHANGES.clone()),
        // External services
        Box::new(EXTERNAL_SERVICE_DURATION.clone()),
        Box::new(EXTERNAL_SERVICE_REQUESTS.clone()),
    ]
}
