//! Job data model and lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::TranscodeError;

/// Message set when a job is first registered.
pub const MSG_CHECKING_AUDIO: &str = "Checking for audio stream...";
/// Message set once the encoder is about to be launched.
pub const MSG_ENCODING: &str = "Encoding started";
/// Message set when the encoder exits successfully.
pub const MSG_COMPLETED: &str = "Video processing completed successfully";

/// Opaque, never-reused job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generates a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parses an id received from a caller.
    ///
    /// Only the canonical lowercase hyphenated UUID form is accepted, so a
    /// parsed id is always safe to use as a single path component and there is
    /// exactly one spelling per job.
    pub fn parse(s: &str) -> Option<Self> {
        let canonical = Uuid::parse_str(s).ok()?.to_string();
        (canonical == s).then(|| Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caller-visible job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal lifecycle phase. Both non-terminal phases report `processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    CheckingAudio,
    Encoding,
    Completed,
    Failed,
}

impl JobPhase {
    pub fn status(&self) -> JobStatus {
        match self {
            Self::CheckingAudio | Self::Encoding => JobStatus::Processing,
            Self::Completed => JobStatus::Completed,
            Self::Failed => JobStatus::Failed,
        }
    }

    /// Returns the phase reached by applying `event`, or `None` if the event is
    /// not accepted in this phase. Terminal phases accept nothing.
    pub fn next(&self, event: &JobEvent) -> Option<JobPhase> {
        match (self, event) {
            (Self::CheckingAudio, JobEvent::AudioChecked { .. }) => Some(Self::Encoding),
            (Self::CheckingAudio, JobEvent::NamespaceFailed { .. }) => Some(Self::Failed),
            (Self::Encoding, JobEvent::LaunchFailed { .. }) => Some(Self::Failed),
            (Self::Encoding, JobEvent::SupervisionFailed { .. }) => Some(Self::Failed),
            (Self::Encoding, JobEvent::Exited { code: Some(0) }) => Some(Self::Completed),
            (Self::Encoding, JobEvent::Exited { .. }) => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CheckingAudio => "checking_audio",
            Self::Encoding => "encoding",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Lifecycle input driving a job from one phase to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// The inspector finished.
    AudioChecked { has_audio: bool },
    /// The output directory could not be created.
    NamespaceFailed { error: String },
    /// The encoder could not be spawned.
    LaunchFailed { error: String },
    /// The encoder exited. `None` means it was killed by a signal.
    Exited { code: Option<i32> },
    /// Waiting on the encoder failed.
    SupervisionFailed { error: String },
}

impl JobEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AudioChecked { .. } => "audio_checked",
            Self::NamespaceFailed { .. } => "namespace_failed",
            Self::LaunchFailed { .. } => "launch_failed",
            Self::Exited { .. } => "exited",
            Self::SupervisionFailed { .. } => "supervision_failed",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::AudioChecked { .. } => MSG_ENCODING.to_string(),
            Self::NamespaceFailed { error } => {
                format!("Failed to create output directory: {}", error)
            }
            Self::LaunchFailed { error } => format!("Encoder failed to start: {}", error),
            Self::Exited { code: Some(0) } => MSG_COMPLETED.to_string(),
            Self::Exited { code } => TranscodeError::Encode { code: *code }.to_string(),
            Self::SupervisionFailed { error } => {
                format!("Lost track of encoder process: {}", error)
            }
        }
    }
}

/// One submitted transcode request and its tracked state.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub phase: JobPhase,
    pub message: String,
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_audio: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Creates a job in its initial phase.
    pub fn new(id: JobId, input_path: PathBuf, output_dir: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            id,
            phase: JobPhase::CheckingAudio,
            message: MSG_CHECKING_AUDIO.to_string(),
            input_path,
            output_dir,
            has_audio: None,
            exit_code: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.phase.status()
    }

    /// Applies a lifecycle event, overwriting the message.
    pub fn apply(&mut self, event: &JobEvent) -> Result<(), TranscodeError> {
        let next = self
            .phase
            .next(event)
            .ok_or_else(|| TranscodeError::InvalidTransition {
                job_id: self.id.clone(),
                from: self.phase,
                event: event.name(),
            })?;

        match event {
            JobEvent::AudioChecked { has_audio } => self.has_audio = Some(*has_audio),
            JobEvent::Exited { code } => self.exit_code = *code,
            _ => {}
        }

        self.phase = next;
        self.message = event.message();
        self.updated_at = Utc::now();
        Ok(())
    }
}
