//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "gifsmith_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "gifsmith_http_request_duration_seconds";

    // Job metrics
    pub const UPLOADS_TOTAL: &str = "gifsmith_uploads_total";
    pub const CACHE_HITS_TOTAL: &str = "gifsmith_cache_hits_total";
    pub const JOBS_STARTED_TOTAL: &str = "gifsmith_jobs_started_total";

    // Streaming metrics
    pub const STREAM_CONNECTIONS_TOTAL: &str = "gifsmith_stream_connections_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "gifsmith_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record an accepted upload.
pub fn record_upload(cache_hit: bool) {
    counter!(names::UPLOADS_TOTAL).increment(1);
    if cache_hit {
        counter!(names::CACHE_HITS_TOTAL).increment(1);
    } else {
        counter!(names::JOBS_STARTED_TOTAL).increment(1);
    }
}

/// Record a new event stream subscription.
pub fn record_stream_connection() {
    counter!(names::STREAM_CONNECTIONS_TOTAL).increment(1);
}

/// Record a rate limit rejection.
pub fn record_rate_limit_hit(path: &str) {
    let labels = [("path", sanitize_path(path))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// HTTP metrics middleware.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

/// Collapse per-job path segments so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if uuid::Uuid::parse_str(segment).is_ok() {
                ":job_id"
            } else if segment.ends_with(".gif") || segment.ends_with(".GIF") {
                ":filename"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
