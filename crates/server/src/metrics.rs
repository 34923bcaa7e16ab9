//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the dashpack server:
//! - HTTP request metrics (latency, counts, bytes served)
//! - Job status transitions
//! - Jobs by status (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;
use std::sync::Arc;

use dashpack_core::{JobUpdate, JobUpdateCallback};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "dashpack_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dashpack_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "dashpack_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Response body bytes sent, by route.
pub static HTTP_RESPONSE_BYTES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dashpack_http_response_bytes_total",
            "Response body bytes sent",
        ),
        &["path"],
    )
    .unwrap()
});

// =============================================================================
// Job Metrics
// =============================================================================

/// Jobs by current status (collected dynamically).
pub static JOBS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("dashpack_jobs_by_status", "Current job count by status"),
        &["status"],
    )
    .unwrap()
});

/// Job phase transitions.
pub static JOB_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dashpack_job_transitions_total",
            "Job phase transitions",
        ),
        &["phase"],
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_RESPONSE_BYTES.clone()))
        .unwrap();

    // Jobs
    registry
        .register(Box::new(JOBS_BY_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(JOB_TRANSITIONS.clone()))
        .unwrap();

    // Core metrics (lifecycle, encoder, cleanup)
    for metric in dashpack_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Collect dynamic metrics from current application state.
///
/// This is called before encoding metrics to update gauges with current values
/// from the job registry.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let counts = state.coordinator().registry().status_counts();
    JOBS_BY_STATUS
        .with_label_values(&["processing"])
        .set(counts.processing as i64);
    JOBS_BY_STATUS
        .with_label_values(&["completed"])
        .set(counts.completed as i64);
    JOBS_BY_STATUS
        .with_label_values(&["failed"])
        .set(counts.failed as i64);
}

/// Update callback that counts job phase transitions.
pub fn job_update_callback() -> JobUpdateCallback {
    Arc::new(|update: &JobUpdate| {
        if let JobUpdate::StatusChanged(job) = update {
            JOB_TRANSITIONS
                .with_label_values(&[&job.phase.to_string()])
                .inc();
        }
    })
}

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs and segment names with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_RE.replace_all(path, "{id}");
    let result = NUMERIC_RE.replace_all(&result, "/{id}$1").to_string();

    // One label for all media segments of a job
    if let Some(pos) = result.find("/video/{id}/") {
        let tail = &result[pos + "/video/{id}/".len()..];
        if !tail.is_empty() && tail != dashpack_core::MANIFEST_FILE_NAME {
            return format!("{}{{segment}}", &result[..pos + "/video/{id}/".len()]);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/status/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/status/{id}");
    }

    #[test]
    fn test_normalize_path_manifest() {
        let path = "/api/v1/video/550e8400-e29b-41d4-a716-446655440000/manifest.mpd";
        assert_eq!(normalize_path(path), "/api/v1/video/{id}/manifest.mpd");
    }

    #[test]
    fn test_normalize_path_segment() {
        let path = "/api/v1/video/550e8400-e29b-41d4-a716-446655440000/chunk-stream2-00017.m4s";
        assert_eq!(normalize_path(path), "/api/v1/video/{id}/{segment}");
    }

    #[test]
    fn test_normalize_path_numeric() {
        let path = "/api/v1/status/12345";
        assert_eq!(normalize_path(path), "/api/v1/status/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        let path = "/api/v1/health";
        assert_eq!(normalize_path(path), "/api/v1/health");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("dashpack_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_all_metrics() {
        // Prometheus only outputs vectors that have at least one child
        HTTP_REQUEST_DURATION
            .with_label_values(&["GET", "/test", "200"])
            .observe(0.1);
        HTTP_REQUESTS_IN_FLIGHT.set(0);
        HTTP_RESPONSE_BYTES.with_label_values(&["/test"]).inc_by(10);
        JOBS_BY_STATUS.with_label_values(&["processing"]).set(0);
        JOB_TRANSITIONS.with_label_values(&["encoding"]).inc();
        dashpack_core::metrics::JOBS_SUBMITTED.inc();

        let output = encode_metrics();

        assert!(output.contains("dashpack_http_request_duration_seconds"));
        assert!(output.contains("dashpack_http_requests_in_flight"));
        assert!(output.contains("dashpack_http_response_bytes_total"));
        assert!(output.contains("dashpack_jobs_by_status"));
        assert!(output.contains("dashpack_job_transitions_total"));
        assert!(output.contains("dashpack_jobs_submitted_total"));
    }

    #[test]
    fn test_job_update_callback_counts_transitions() {
        let job = dashpack_core::Job::new(
            dashpack_core::JobId::generate(),
            "/uploads/a.mp4".into(),
            "/video/a".into(),
        );
        let before = JOB_TRANSITIONS.with_label_values(&["checking_audio"]).get();
        job_update_callback()(&JobUpdate::StatusChanged(job));
        assert_eq!(
            JOB_TRANSITIONS.with_label_values(&["checking_audio"]).get(),
            before + 1
        );
    }
}
