//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Job lifecycle (submissions, outcomes, failure reasons)
//! - Encoder (duration, jobs in flight)
//! - Stream inspection and input cleanup

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Job Lifecycle Metrics
// =============================================================================

/// Jobs submitted to the coordinator.
pub static JOBS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("dashpack_jobs_submitted_total", "Total transcode jobs submitted").unwrap()
});

/// Jobs that reached a terminal state, by result.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dashpack_jobs_finished_total",
            "Total transcode jobs that reached a terminal state",
        ),
        &["result"], // "completed", "failed"
    )
    .unwrap()
});

/// Job failures by reason.
pub static JOB_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dashpack_job_failures_total", "Total job failures by reason"),
        &["reason"], // "resource", "launch", "encode", "supervision"
    )
    .unwrap()
});

// =============================================================================
// Encoder Metrics
// =============================================================================

/// Encoder run time in seconds, by result.
pub static ENCODE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "dashpack_encode_duration_seconds",
            "Duration of encoder processes",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0]),
        &["result"],
    )
    .unwrap()
});

/// Encoder processes currently running.
pub static JOBS_ENCODING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("dashpack_jobs_encoding", "Encoder processes currently running").unwrap()
});

// =============================================================================
// Inspection and Cleanup Metrics
// =============================================================================

/// Audio detection results.
pub static AUDIO_DETECTION: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dashpack_audio_detection_total",
            "Audio stream detection results",
        ),
        &["result"], // "present", "absent"
    )
    .unwrap()
});

/// Inputs that could not be deleted after a successful encode.
pub static CLEANUP_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dashpack_cleanup_failures_total",
        "Input files that could not be removed after a successful encode",
    )
    .unwrap()
});

/// Returns all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Lifecycle
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(JOB_FAILURES.clone()),
        // Encoder
        Box::new(ENCODE_DURATION.clone()),
        Box::new(JOBS_ENCODING.clone()),
        // Inspection and cleanup
        Box::new(AUDIO_DETECTION.clone()),
        Box::new(CLEANUP_FAILURES.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_registers_cleanly() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        JOBS_FINISHED.with_label_values(&["completed"]).inc();
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"dashpack_jobs_finished_total".to_string()));
    }
}
