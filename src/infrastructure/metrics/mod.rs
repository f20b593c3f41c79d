//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Preview request counts by status and latency
//! - Security rejections (path traversal, invalid host)
//! - Plan/publish runs by outcome and failing stage
//! - Publish duration histograms and in-progress gauge

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Preview request counter by response status
pub static PREVIEW_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("preview_requests_total", "Total number of preview requests")
            .namespace("sitepress"),
        &["status"],
    )
    .expect("Failed to create PREVIEW_REQUESTS_TOTAL metric")
});

/// Preview latency histogram
pub static PREVIEW_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];
    HistogramVec::new(
        HistogramOpts::new(
            "preview_request_duration_seconds",
            "Preview request latency in seconds",
        )
        .namespace("sitepress")
        .buckets(buckets),
        &["status"],
    )
    .expect("Failed to create PREVIEW_REQUEST_DURATION_SECONDS metric")
});

/// Requests rejected at a security boundary
pub static SECURITY_REJECTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "security_rejections_total",
            "Requests rejected at a security boundary",
        )
        .namespace("sitepress"),
        &["reason"], // "invalid_host", "path_traversal"
    )
    .expect("Failed to create SECURITY_REJECTIONS_TOTAL metric")
});

/// Plan and publish runs by outcome and failing stage
pub static PUBLISH_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("publish_runs_total", "Plan and publish invocations").namespace("sitepress"),
        &["operation", "outcome", "stage"],
    )
    .expect("Failed to create PUBLISH_RUNS_TOTAL metric")
});

/// Plan/publish duration histogram
pub static PUBLISH_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];
    HistogramVec::new(
        HistogramOpts::new("publish_duration_seconds", "Plan/publish latency in seconds")
            .namespace("sitepress")
            .buckets(buckets),
        &["operation"],
    )
    .expect("Failed to create PUBLISH_DURATION_SECONDS metric")
});

/// Publishes currently holding a site lock
pub static PUBLISHES_IN_PROGRESS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("publishes_in_progress", "Publishes currently running").namespace("sitepress"),
    )
    .expect("Failed to create PUBLISHES_IN_PROGRESS metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(PREVIEW_REQUESTS_TOTAL.clone()))
        .expect("Failed to register PREVIEW_REQUESTS_TOTAL");
    registry
        .register(Box::new(PREVIEW_REQUEST_DURATION_SECONDS.clone()))
        .expect("Failed to register PREVIEW_REQUEST_DURATION_SECONDS");
    registry
        .register(Box::new(SECURITY_REJECTIONS_TOTAL.clone()))
        .expect("Failed to register SECURITY_REJECTIONS_TOTAL");
    registry
        .register(Box::new(PUBLISH_RUNS_TOTAL.clone()))
        .expect("Failed to register PUBLISH_RUNS_TOTAL");
    registry
        .register(Box::new(PUBLISH_DURATION_SECONDS.clone()))
        .expect("Failed to register PUBLISH_DURATION_SECONDS");
    registry
        .register(Box::new(PUBLISHES_IN_PROGRESS.clone()))
        .expect("Failed to register PUBLISHES_IN_PROGRESS");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Helper to record a served preview request
pub fn record_preview_request(status: u16, duration_secs: f64) {
    let status = status.to_string();
    PREVIEW_REQUESTS_TOTAL.with_label_values(&[status.as_str()]).inc();
    PREVIEW_REQUEST_DURATION_SECONDS
        .with_label_values(&[status.as_str()])
        .observe(duration_secs);
}

/// Helper to record a security rejection
pub fn record_security_rejection(reason: &str) {
    SECURITY_REJECTIONS_TOTAL.with_label_values(&[reason]).inc();
}

/// Helper to record a finished plan or publish
pub fn record_publish_run(operation: &str, stage: Option<&str>, duration_secs: f64) {
    let outcome = if stage.is_some() { "failure" } else { "success" };
    PUBLISH_RUNS_TOTAL
        .with_label_values(&[operation, outcome, stage.unwrap_or("none")])
        .inc();
    PUBLISH_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration_secs);
}
