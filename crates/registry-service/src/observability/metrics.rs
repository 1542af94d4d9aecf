//! Metrics definitions for the registry service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `registry_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! The only label is `operation`, bounded by the store adapter and registry
//! operation names (~15 values). Registry keys and members are never used as
//! labels.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder and serve `/metrics` on `bind_address`.
///
/// Must be called from within a Tokio runtime, before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder is already installed or the listener cannot bind.
pub fn init_metrics_recorder(bind_address: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(bind_address)
        // Store latency buckets - p99 should stay well under 10ms
        .set_buckets_for_metric(
            Matcher::Prefix("registry_store".to_string()),
            &[
                0.0005, 0.001, 0.0025, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500,
            ],
        )
        .map_err(|e| format!("Failed to set store latency buckets: {e}"))?
        .install()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Store Adapter Metrics
// ============================================================================

/// Record store command latency.
///
/// Metric: `registry_store_latency_seconds`
/// Labels: `operation` (get, set, delete, set_add, set_remove, set_members, set_swap)
pub fn record_store_latency(operation: &'static str, duration: Duration) {
    histogram!("registry_store_latency_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
}

/// Record a failed store command.
///
/// Metric: `registry_store_errors_total`
/// Labels: `operation`
pub fn record_store_error(operation: &'static str) {
    counter!("registry_store_errors_total", "operation" => operation).increment(1);
}

// ============================================================================
// Registry Metrics
// ============================================================================

/// Record a stored token that could not be decoded.
///
/// Metric: `registry_decode_failures_total`
/// Labels: `operation` (list_valid, purge_expired, increment_retry, filter_by_key)
///
/// Non-zero values mean another writer is storing non-conforming elements
/// in a registry set.
pub fn record_decode_failure(operation: &'static str) {
    counter!("registry_decode_failures_total", "operation" => operation).increment(1);
}

/// Record expired entries removed by a purge.
///
/// Metric: `registry_entries_purged_total`
pub fn record_entries_purged(count: u64) {
    counter!("registry_entries_purged_total").increment(count);
}

/// Record retry count increments applied.
///
/// Metric: `registry_retry_increments_total`
pub fn record_retry_increments(count: u64) {
    counter!("registry_retry_increments_total").increment(count);
}
