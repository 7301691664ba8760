//! Prometheus metrics.
//!
//! - Cache hits per tier, misses, and tier degradations
//! - Upstream request outcomes
//! - Query responses by provenance

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_TIER_ERRORS_TOTAL: &str = "cache_tier_errors_total";

    pub const UPSTREAM_REQUESTS_TOTAL: &str = "upstream_requests_total";
    pub const UPSTREAM_CASE_RETRIES_TOTAL: &str = "upstream_case_retries_total";

    pub const QUERY_RESPONSES_TOTAL: &str = "query_responses_total";
}

/// Initialize the Prometheus metrics exporter.
///
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    // Pull-based: /metrics renders the handle
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }
            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

pub fn record_cache_hit(tier: &'static str) {
    counter!(names::CACHE_HITS_TOTAL, "tier" => tier).increment(1);
}

pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

pub fn record_cache_tier_error(tier: &'static str, operation: &'static str) {
    counter!(names::CACHE_TIER_ERRORS_TOTAL, "tier" => tier, "operation" => operation).increment(1);
}

/// `outcome` is one of `ok`, `empty`, `unavailable`, `bad_response`.
pub fn record_upstream_request(outcome: &'static str) {
    counter!(names::UPSTREAM_REQUESTS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_case_retry(recovered: bool) {
    let recovered = if recovered { "true" } else { "false" };
    counter!(names::UPSTREAM_CASE_RETRIES_TOTAL, "recovered" => recovered).increment(1);
}

pub fn record_query_response(source: &'static str) {
    counter!(names::QUERY_RESPONSES_TOTAL, "source" => source).increment(1);
}
