//! Metrics and observability utilities
//!
//! Metrics are recorded through the `metrics` facade; the binary decides
//! whether an exporter is installed.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all CiteForge metrics
pub const METRICS_PREFIX: &str = "citeforge";

/// Buckets for a single source attempt (network bound)
pub const RESOLUTION_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_resolutions_total", METRICS_PREFIX),
        Unit::Count,
        "Source attempts by source and outcome"
    );

    describe_histogram!(
        format!("{}_resolution_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Latency of a single source attempt in seconds"
    );

    describe_counter!(
        format!("{}_unresolved_total", METRICS_PREFIX),
        Unit::Count,
        "Titles for which every source failed"
    );

    describe_gauge!(
        format!("{}_graph_nodes", METRICS_PREFIX),
        Unit::Count,
        "Graph entries by depth level"
    );

    describe_counter!(
        format!("{}_indexes_built_total", METRICS_PREFIX),
        Unit::Count,
        "Per-node lexical indexes built"
    );

    describe_counter!(
        format!("{}_index_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Per-node lexical index failures"
    );

    tracing::info!("Metrics registered");
}

/// Record one attempt against one source
pub fn record_resolution(duration_secs: f64, source: &str, success: bool) {
    let outcome = if success { "success" } else { "error" };

    counter!(
        format!("{}_resolutions_total", METRICS_PREFIX),
        "source" => source.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_resolution_duration_seconds", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .record(duration_secs);
}

/// Record a title that no source could resolve
pub fn record_unresolved(pass: &str) {
    counter!(
        format!("{}_unresolved_total", METRICS_PREFIX),
        "pass" => pass.to_string()
    )
    .increment(1);
}

/// Record current graph size at a depth level
pub fn record_graph_size(level: u8, count: usize) {
    gauge!(
        format!("{}_graph_nodes", METRICS_PREFIX),
        "level" => level.to_string()
    )
    .set(count as f64);
}

/// Record the outcome of a per-node index build
pub fn record_index_build(success: bool) {
    if success {
        counter!(format!("{}_indexes_built_total", METRICS_PREFIX)).increment(1);
    } else {
        counter!(format!("{}_index_failures_total", METRICS_PREFIX)).increment(1);
    }
}
