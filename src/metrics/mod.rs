// Metrics module - Prometheus metrics for the transform service
//
// Provides:
// - Request counters by HTTP status
// - Pipeline step counters by operation and outcome
// - Secondary image fetch counters by outcome
// - Response cache hit/miss counters
// - Request duration histogram by output format

use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounter,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Global metrics for the transform service
pub struct TransformMetrics {
    /// Requests by response status
    pub requests: IntCounterVec,

    /// Pipeline steps by operation and outcome (applied, failed, skipped, unknown)
    pub steps: IntCounterVec,

    /// Secondary image fetches by outcome
    pub secondary_fetches: IntCounterVec,

    /// Response cache hits
    pub cache_hits: IntCounter,

    /// Response cache misses
    pub cache_misses: IntCounter,

    /// Transform duration histogram (in seconds) by output format
    pub duration: HistogramVec,
}

/// Global singleton instance of metrics
static METRICS: OnceLock<TransformMetrics> = OnceLock::new();

impl TransformMetrics {
    /// Initialize and return the global metrics instance
    ///
    /// Subsequent calls return the same instance.
    pub fn global() -> &'static Self {
        METRICS.get_or_init(|| {
            let requests = register_int_counter_vec!(
                "pixelrelay_requests_total",
                "Total number of transform requests by response status",
                &["status"]
            )
            .expect("Failed to register requests_total metric");

            let steps = register_int_counter_vec!(
                "pixelrelay_pipeline_steps_total",
                "Pipeline steps by operation and outcome",
                &["operation", "outcome"]
            )
            .expect("Failed to register pipeline_steps_total metric");

            let secondary_fetches = register_int_counter_vec!(
                "pixelrelay_secondary_fetches_total",
                "Secondary image fetches by outcome",
                &["outcome"] // ok, not_allowed, invalid_url, fetch_error, bad_status, decode_error
            )
            .expect("Failed to register secondary_fetches_total metric");

            let cache_ops = register_int_counter_vec!(
                "pixelrelay_response_cache_total",
                "Response cache lookups by result",
                &["result"] // hit, miss
            )
            .expect("Failed to register response_cache_total metric");

            let duration = register_histogram_vec!(
                "pixelrelay_transform_duration_seconds",
                "Duration of transform requests in seconds",
                &["format"],
                vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0] // 5ms to 10s
            )
            .expect("Failed to register transform_duration_seconds metric");

            TransformMetrics {
                requests,
                steps,
                secondary_fetches,
                cache_hits: cache_ops.with_label_values(&["hit"]),
                cache_misses: cache_ops.with_label_values(&["miss"]),
                duration,
            }
        })
    }

    pub fn record_request(&self, status: u16) {
        self.requests
            .with_label_values(&[&status.to_string()])
            .inc();
    }

    pub fn record_step(&self, operation: &str, outcome: &str) {
        self.steps.with_label_values(&[operation, outcome]).inc();
    }

    pub fn record_secondary_fetch(&self, outcome: &str) {
        self.secondary_fetches.with_label_values(&[outcome]).inc();
    }

    pub fn observe_duration(&self, format: &str, seconds: f64) {
        self.duration.with_label_values(&[format]).observe(seconds);
    }
}

/// Render every registered metric in the Prometheus text format
pub fn export() -> String {
    // Make sure the transform metrics exist even before the first request
    let _ = TransformMetrics::global();

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
