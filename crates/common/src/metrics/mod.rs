//! Metrics and observability utilities
//!
//! Metric names and recording helpers on the `metrics` facade. Nothing is
//! exported unless the embedding binary installs a recorder.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all citeset metrics
pub const METRICS_PREFIX: &str = "citeset";

/// Register all metric descriptions
pub fn register_metrics() {
    // Fetch metrics
    describe_counter!(
        format!("{}_fetch_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total source lookups, labelled by source and outcome"
    );

    describe_histogram!(
        format!("{}_fetch_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Source lookup latency in seconds, retries included"
    );

    describe_counter!(
        format!("{}_fetch_retries_total", METRICS_PREFIX),
        Unit::Count,
        "Transient failures that were retried"
    );

    // Analysis metrics
    describe_counter!(
        format!("{}_aggregations_total", METRICS_PREFIX),
        Unit::Count,
        "Total restricted aggregation runs"
    );

    describe_gauge!(
        format!("{}_restricted_edges", METRICS_PREFIX),
        Unit::Count,
        "Edges in the most recent restricted citation graph"
    );

    tracing::debug!("Metrics registered");
}

/// Helper to record one source lookup
pub struct FetchMetrics {
    start: Instant,
    source: String,
}

impl FetchMetrics {
    /// Start tracking a lookup
    pub fn start(source: &str) -> Self {
        Self {
            start: Instant::now(),
            source: source.to_string(),
        }
    }

    /// Record lookup completion
    pub fn finish(self, outcome: &str) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_fetch_requests_total", METRICS_PREFIX),
            "source" => self.source.clone(),
            "outcome" => outcome.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_fetch_duration_seconds", METRICS_PREFIX),
            "source" => self.source
        )
        .record(duration);
    }
}

/// Helper to record a retried transient failure
pub fn record_retry(source: &str) {
    counter!(
        format!("{}_fetch_retries_total", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .increment(1);
}

/// Helper to record an aggregation run
pub fn record_aggregation(edge_count: usize) {
    counter!(format!("{}_aggregations_total", METRICS_PREFIX)).increment(1);
    gauge!(format!("{}_restricted_edges", METRICS_PREFIX)).set(edge_count as f64);
}
