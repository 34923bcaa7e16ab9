//! Error types for the transcode pipeline.

use std::path::PathBuf;
use thiserror::Error;

use crate::job::{JobId, JobPhase};

/// Errors that can occur while inspecting, planning, launching or tracking a job.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// The probing tool was unavailable or failed.
    ///
    /// The coordinator never surfaces this one: a failed probe means "no audio".
    #[error("Probe failed: {reason}")]
    Probe { reason: String },

    /// The job's output directory could not be created.
    #[error("Failed to create output directory {path}: {source}")]
    Resource {
        job_id: JobId,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The encoder process could not be started.
    #[error("Failed to start {program}: {source}")]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The encoder exited unsuccessfully.
    #[error("{}", encode_failure_message(.code))]
    Encode { code: Option<i32> },

    /// No job is registered under this id.
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// A lifecycle event arrived for a job in a state that cannot accept it.
    #[error("Invalid transition for job {job_id}: {event} while {from}")]
    InvalidTransition {
        job_id: JobId,
        from: JobPhase,
        event: &'static str,
    },

    /// I/O error outside of the cases above.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn encode_failure_message(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("Encoder exited with code {}", code),
        None => "Encoder was terminated by a signal".to_string(),
    }
}

impl TranscodeError {
    /// Creates a new probe failed error.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::Probe {
            reason: reason.into(),
        }
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Probe { .. } => "probe",
            Self::Resource { .. } => "resource",
            Self::Launch { .. } => "launch",
            Self::Encode { .. } => "encode",
            Self::NotFound(_) => "not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Io(_) => "io",
        }
    }

    /// The job id carried by the error, if any.
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Self::Resource { job_id, .. }
            | Self::NotFound(job_id)
            | Self::InvalidTransition { job_id, .. } => Some(job_id),
            _ => None,
        }
    }
}
