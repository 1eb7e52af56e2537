//! Provider call metrics.
//!
//! Standardized metrics across all external providers:
//! - Request counters by provider, operation, and status
//! - Latency histograms
//! - Retry counters

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total provider requests by provider, operation, and status.
    pub const REQUESTS_TOTAL: &str = "provider_requests_total";

    /// Total retry attempts by provider and operation.
    pub const RETRIES_TOTAL: &str = "provider_retries_total";

    /// Request latency in seconds by provider and operation.
    pub const LATENCY_SECONDS: &str = "provider_latency_seconds";
}

/// Record metrics for a completed provider request.
pub fn record_request(provider: &'static str, operation: &'static str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "provider" => provider,
        "operation" => operation,
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "provider" => provider,
        "operation" => operation
    )
    .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(provider: &'static str, operation: &'static str) {
    counter!(
        names::RETRIES_TOTAL,
        "provider" => provider,
        "operation" => operation
    )
    .increment(1);
}
