//! Metrics and observability utilities
//!
//! Prometheus metrics via the `metrics` facade with standardized naming.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Metrics prefix for all ReportLens metrics
pub const METRICS_PREFIX: &str = "reportlens";

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of RAG queries"
    );

    describe_histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end query pipeline latency in seconds"
    );

    describe_counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of PDF uploads"
    );

    describe_counter!(
        format!("{}_llm_retries_total", METRICS_PREFIX),
        Unit::Count,
        "Transient LLM failures that triggered a retry"
    );

    describe_counter!(
        format!("{}_audit_dropped_total", METRICS_PREFIX),
        Unit::Count,
        "Audit events dropped because the queue was full"
    );
}

/// Record a completed query
pub fn record_query(duration_secs: f64, namespace: &str, hits: usize) {
    counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        "namespace" => namespace.to_string(),
    )
    .increment(1);

    histogram!(format!("{}_query_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    metrics::gauge!(format!("{}_query_hits", METRICS_PREFIX)).set(hits as f64);
}

/// Record a completed upload
pub fn record_upload(chunks_added: usize) {
    counter!(format!("{}_uploads_total", METRICS_PREFIX)).increment(1);
    metrics::gauge!(format!("{}_upload_chunks", METRICS_PREFIX)).set(chunks_added as f64);
}

/// Record one transient-failure retry
pub fn record_llm_retry(operation: &str) {
    counter!(
        format!("{}_llm_retries_total", METRICS_PREFIX),
        "operation" => operation.to_string(),
    )
    .increment(1);
}
