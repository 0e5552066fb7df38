//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Cache Store (page/detail hits and misses, single-flight joins)
//! - Catalog client (upstream requests and latency)
//! - Prefetch scheduler (task outcomes)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Cache Metrics
// =============================================================================

/// Cache lookups by cache and result.
pub static CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("bookjourney_cache_lookups_total", "Total cache lookups"),
        &["cache", "result"], // cache: "page", "detail"; result: "hit", "miss"
    )
    .unwrap()
});

/// Page misses that waited on a fetch already in flight.
pub static SINGLE_FLIGHT_JOINS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "bookjourney_single_flight_joins_total",
        "Page misses served by joining an in-flight catalog fetch",
    )
    .unwrap()
});

// =============================================================================
// Catalog Metrics
// =============================================================================

/// Catalog requests by outcome.
pub static CATALOG_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "bookjourney_catalog_requests_total",
            "Total catalog search requests",
        ),
        &["status"], // "success", "unavailable", "http_error"
    )
    .unwrap()
});

/// Catalog responses that could not be decoded.
pub static CATALOG_DECODE_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "bookjourney_catalog_decode_failures_total",
        "Catalog responses rejected by the decoder",
    )
    .unwrap()
});

/// Catalog request duration in seconds.
pub static CATALOG_REQUEST_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "bookjourney_catalog_request_duration_seconds",
            "Duration of catalog search requests",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
    )
    .unwrap()
});

// =============================================================================
// Prefetch Metrics
// =============================================================================

/// Prefetch tasks by outcome.
pub static PREFETCH_TASKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("bookjourney_prefetch_tasks_total", "Total prefetch tasks"),
        &["result"], // "completed", "failed", "timed_out", "dropped"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Cache
        Box::new(CACHE_LOOKUPS.clone()),
        Box::new(SINGLE_FLIGHT_JOINS.clone()),
        // Catalog
        Box::new(CATALOG_REQUESTS.clone()),
        Box::new(CATALOG_DECODE_FAILURES.clone()),
        Box::new(CATALOG_REQUEST_DURATION.clone()),
        // Prefetch
        Box::new(PREFETCH_TASKS.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn test_all_metrics_register() {
        let registry = Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        CACHE_LOOKUPS.with_label_values(&["page", "hit"]).inc();
        assert!(!registry.gather().is_empty());
    }
}
