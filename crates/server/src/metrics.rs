//! Prometheus metrics for the HTTP server.
//!
//! This module provides:
//! - HTTP request metrics (recorded by middleware)
//! - Download pool gauges (refreshed from the orchestrator on scrape)
//! - The registry that also carries the core metrics

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use regex_lite::Regex;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tunefetch_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0, 600.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// Total HTTP requests.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tunefetch_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently being processed.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tunefetch_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Download Pool Metrics
// =============================================================================

/// Worker count of the current pool.
pub static DOWNLOAD_POOL_SIZE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tunefetch_download_pool_size",
        "Number of workers in the current download pool",
    )
    .unwrap()
});

pub static DOWNLOAD_POOL_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tunefetch_download_pool_active",
        "Number of running downloads",
    )
    .unwrap()
});

pub static DOWNLOAD_POOL_QUEUED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tunefetch_download_pool_queued",
        "Number of downloads waiting for a worker",
    )
    .unwrap()
});

/// Replaced pools still draining.
pub static RETIRING_POOLS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tunefetch_download_pools_retiring",
        "Number of replaced download pools still draining",
    )
    .unwrap()
});

pub static SETTINGS_VERSION: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tunefetch_settings_version",
        "Version of the active settings snapshot",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP metrics
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Download pool metrics
    registry
        .register(Box::new(DOWNLOAD_POOL_SIZE.clone()))
        .unwrap();
    registry
        .register(Box::new(DOWNLOAD_POOL_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(DOWNLOAD_POOL_QUEUED.clone()))
        .unwrap();
    registry.register(Box::new(RETIRING_POOLS.clone())).unwrap();
    registry
        .register(Box::new(SETTINGS_VERSION.clone()))
        .unwrap();

    // Core metrics (download pool, orchestrator, external services)
    for metric in tunefetch_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the pool gauges reflect the current pool.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.orchestrator().status().await;

    DOWNLOAD_POOL_SIZE.set(status.pool.size as i64);
    DOWNLOAD_POOL_ACTIVE.set(status.pool.active as i64);
    DOWNLOAD_POOL_QUEUED.set(status.pool.queued as i64);
    RETIRING_POOLS.set(status.retiring_pools as i64);
    SETTINGS_VERSION.set(status.settings_version as i64);
}

static UUID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

static NUMERIC_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_REGEX.replace_all(path, "{id}");
    let result = NUMERIC_REGEX.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/download/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/download/{id}");
    }

    #[test]
    fn test_normalize_path_numeric() {
        let path = "/api/v1/songs/12345/cover";
        assert_eq!(normalize_path(path), "/api/v1/songs/{id}/cover");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        let path = "/api/v1/download/search";
        assert_eq!(normalize_path(path), "/api/v1/download/search");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("tunefetch_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_pool_metrics() {
        DOWNLOAD_POOL_SIZE.set(3);
        DOWNLOAD_POOL_ACTIVE.set(0);
        RETIRING_POOLS.set(0);
        tunefetch_core::metrics::DOWNLOADS_STARTED.inc();

        let output = encode_metrics();
        assert!(output.contains("tunefetch_download_pool_size 3"));
        assert!(output.contains("tunefetch_download_pool_active"));
        assert!(output.contains("tunefetch_download_pools_retiring"));
        assert!(output.contains("tunefetch_downloads_started_total"));
    }
}
