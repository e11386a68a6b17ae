//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "lectern_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "lectern_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "lectern_http_requests_in_flight";

    // Uploads
    pub const UPLOADS_TOTAL: &str = "lectern_uploads_total";
    pub const UPLOAD_BYTES_TOTAL: &str = "lectern_upload_bytes_total";

    // Event streams
    pub const EVENT_STREAMS_TOTAL: &str = "lectern_event_streams_total";
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
pub fn record_upload(bytes: u64) {
    counter!(names::UPLOADS_TOTAL).increment(1);
    counter!(names::UPLOAD_BYTES_TOTAL).increment(bytes);
}

pub fn record_event_stream_opened() {
    counter!(names::EVENT_STREAMS_TOTAL).increment(1);
}

/// Collapse IDs and media paths so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    let mut out = Vec::new();
    let mut segments = path.split('/');
    while let Some(segment) = segments.next() {
        match segment {
            "videos" => {
                out.push(segment);
                if segments.next().is_some() {
                    out.push(":video_id");
                }
            }
            "media" if out.len() <= 1 => {
                out.push(segment);
                out.push("*");
                break;
            }
            _ => out.push(segment),
        }
    }
    out.join("/")
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
