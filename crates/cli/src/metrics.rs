//! Prometheus registry for the command line tool.
//!
//! Registers the core counters plus gauges for the prefetch pool, which
//! are refreshed from the service right before encoding.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntGauge, Registry, TextEncoder};

use bookjourney_core::PoolStatus;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Prefetches currently fetching.
pub static PREFETCH_POOL_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "bookjourney_prefetch_pool_active",
        "Prefetch tasks currently running",
    )
    .unwrap()
});

/// Prefetches waiting for a worker.
pub static PREFETCH_POOL_QUEUED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "bookjourney_prefetch_pool_queued",
        "Prefetch tasks waiting for a worker",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(PREFETCH_POOL_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(PREFETCH_POOL_QUEUED.clone()))
        .unwrap();

    for metric in bookjourney_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Copy the prefetch pool snapshot into the gauges.
pub fn collect_pool_metrics(status: &PoolStatus) {
    PREFETCH_POOL_ACTIVE.set(status.active as i64);
    PREFETCH_POOL_QUEUED.set(status.queued as i64);
}

/// Encode all metrics in the Prometheus text format.
pub fn encode_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookjourney_core::metrics::{CACHE_LOOKUPS, SINGLE_FLIGHT_JOINS};

    #[test]
    fn test_encode_includes_core_and_pool_metrics() {
        CACHE_LOOKUPS.with_label_values(&["page", "miss"]).inc();
        SINGLE_FLIGHT_JOINS.inc();
        collect_pool_metrics(&PoolStatus {
            enabled: true,
            active: 2,
            max_concurrent: 4,
            queued: 1,
            max_queued: 64,
            total_completed: 0,
            total_failed: 0,
            total_timed_out: 0,
            total_dropped: 0,
        });

        let output = encode_metrics().unwrap();
        assert!(output.contains("# HELP"));
        assert!(output.contains("bookjourney_cache_lookups_total"));
        assert!(output.contains("bookjourney_single_flight_joins_total"));
        assert!(output.contains("bookjourney_prefetch_pool_active 2"));
        assert!(output.contains("bookjourney_prefetch_pool_queued 1"));
    }
}
