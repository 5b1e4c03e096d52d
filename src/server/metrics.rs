use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

const PREFIX: &str = "charts";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    pub static ref INTERACTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_interactions_total"), "Recorded user interactions"),
        &["content_type", "kind"]
    ).expect("Failed to create interactions_total metric");

    pub static ref CHART_BUILDS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_chart_builds_total"), "Chart builds by outcome"),
        &["category", "outcome"]
    ).expect("Failed to create chart_builds_total metric");

    pub static ref CHART_BUILD_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_chart_build_duration_seconds"),
            "Chart build duration in seconds"
        )
        .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        &["category"]
    ).expect("Failed to create chart_build_duration_seconds metric");

    pub static ref REBUILDS_COALESCED_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_rebuilds_coalesced_total"),
        "Rebuild requests absorbed by the cooldown or an in-flight build"
    ).expect("Failed to create rebuilds_coalesced_total metric");

    pub static ref FANOUT_MESSAGES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_fanout_messages_total"), "Realtime messages handed to subscribers"),
        &["event"]
    ).expect("Failed to create fanout_messages_total metric");

    pub static ref WS_CONNECTIONS: Gauge = Gauge::new(
        format!("{PREFIX}_ws_connections"),
        "Open realtime connections"
    ).expect("Failed to create ws_connections metric");

    pub static ref BACKGROUND_JOB_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_background_job_runs_total"), "Background job executions"),
        &["job_id", "outcome"]
    ).expect("Failed to create background_job_runs_total metric");
}

/// Registers every metric. Safe to call more than once.
pub fn init_metrics() {
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(INTERACTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CHART_BUILDS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CHART_BUILD_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(REBUILDS_COALESCED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(FANOUT_MESSAGES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(WS_CONNECTIONS.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_RUNS_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

pub fn record_interaction(content_type: &str, kind: &str) {
    INTERACTIONS_TOTAL
        .with_label_values(&[content_type, kind])
        .inc();
}

pub fn record_chart_build(category: &str, outcome: &str, duration: Duration) {
    CHART_BUILDS_TOTAL
        .with_label_values(&[category, outcome])
        .inc();
    CHART_BUILD_DURATION_SECONDS
        .with_label_values(&[category])
        .observe(duration.as_secs_f64());
}

pub fn record_rebuild_coalesced() {
    REBUILDS_COALESCED_TOTAL.inc();
}

pub fn record_fanout(event: &str, delivered: usize) {
    FANOUT_MESSAGES_TOTAL
        .with_label_values(&[event])
        .inc_by(delivered as f64);
}

pub fn set_ws_connections(count: usize) {
    WS_CONNECTIONS.set(count as f64);
}

pub fn record_background_job(job_id: &str, outcome: &str) {
    BACKGROUND_JOB_RUNS_TOTAL
        .with_label_values(&[job_id, outcome])
        .inc();
}

/// Collapses ids out of a path so metric labels stay bounded.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if uuid::Uuid::parse_str(segment).is_ok() {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
