//! Trait definitions for the probe and encoder collaborators.

use async_trait::async_trait;
use std::path::Path;
use tracing::warn;

use super::planner::EncodeInvocation;
use crate::error::TranscodeError;
use crate::job::JobId;

/// Detects whether a source contains audio.
#[async_trait]
pub trait StreamInspector: Send + Sync {
    /// Returns the name of this inspector implementation.
    fn name(&self) -> &str;

    /// Probes the source for at least one audio stream.
    async fn probe_audio(&self, path: &Path) -> Result<bool, TranscodeError>;

    /// Fail-safe variant of [`probe_audio`](Self::probe_audio): any probe
    /// failure counts as "no audio".
    async fn has_audio(&self, path: &Path) -> bool {
        match self.probe_audio(path).await {
            Ok(found) => found,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Audio probe failed, assuming no audio");
                false
            }
        }
    }
}

/// How an encoder process ended.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExitOutcome {
    /// Exit code, or `None` when terminated by a signal.
    pub code: Option<i32>,
    /// Last lines the process wrote to stderr.
    pub stderr_tail: Vec<String>,
}

impl ExitOutcome {
    pub fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            stderr_tail: Vec::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A running encoder process.
#[async_trait]
pub trait EncodeProcess: Send {
    /// OS process id, if known.
    fn pid(&self) -> Option<u32>;

    /// Waits for the process to exit.
    ///
    /// Implementations must keep draining the process output while waiting.
    async fn wait(&mut self) -> std::io::Result<ExitOutcome>;
}

/// Starts encoder processes.
#[async_trait]
pub trait EncodeLauncher: Send + Sync {
    /// Returns the name of this launcher implementation.
    fn name(&self) -> &str;

    /// Spawns the encoder for `invocation`. Returns as soon as the process is running.
    async fn launch(
        &self,
        job_id: &JobId,
        invocation: &EncodeInvocation,
    ) -> Result<Box<dyn EncodeProcess>, TranscodeError>;
}
