//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use eyeblur_media::PipelineStats;
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
    pub const HTTP_REQUESTS_TOTAL: &str = "eyeblur_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "eyeblur_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "eyeblur_http_requests_in_flight";

    // Processing metrics
    pub const VIDEOS_PROCESSED_TOTAL: &str = "eyeblur_videos_processed_total";
    pub const VIDEOS_FAILED_TOTAL: &str = "eyeblur_videos_failed_total";
    pub const ACQUISITION_DURATION_SECONDS: &str = "eyeblur_acquisition_duration_seconds";
    pub const PIPELINE_DURATION_SECONDS: &str = "eyeblur_pipeline_duration_seconds";
    pub const FRAMES_PROCESSED_TOTAL: &str = "eyeblur_frames_processed_total";
    pub const EYE_REGIONS_BLURRED_TOTAL: &str = "eyeblur_eye_regions_blurred_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", route_label(path).to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record input acquisition time.
pub fn record_acquisition_duration(source: &str, duration_secs: f64) {
    let labels = [("source", source.to_string())];
    histogram!(names::ACQUISITION_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a successful blur job.
pub fn record_video_processed(source: &str, stats: &PipelineStats, duration_secs: f64) {
    let labels = [("source", source.to_string())];
    counter!(names::VIDEOS_PROCESSED_TOTAL, &labels).increment(1);
    histogram!(names::PIPELINE_DURATION_SECONDS, &labels).record(duration_secs);
    counter!(names::FRAMES_PROCESSED_TOTAL).increment(stats.frames as u64);
    counter!(names::EYE_REGIONS_BLURRED_TOTAL).increment(stats.regions_blurred as u64);
}

/// Record a failed blur job by the operation that failed.
pub fn record_video_failed(source: &str, operation: &str) {
    let labels = [
        ("source", source.to_string()),
        ("operation", operation.to_string()),
    ];
    counter!(names::VIDEOS_FAILED_TOTAL, &labels).increment(1);
}

/// Collapse request paths onto the known routes to bound label cardinality.
fn route_label(path: &str) -> &'static str {
    match path {
        "/blur-eyes" => "/blur-eyes",
        "/health" => "/health",
        "/metrics" => "/metrics",
        _ => "other",
    }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_label() {
        assert_eq!(route_label("/blur-eyes"), "/blur-eyes");
        assert_eq!(route_label("/health"), "/health");
        assert_eq!(route_label("/wp-admin/login.php"), "other");
    }
}
