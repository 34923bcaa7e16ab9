//! Mock encoder launcher for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

use crate::encoder::{EncodeInvocation, EncodeLauncher, EncodeProcess, ExitOutcome};
use crate::error::TranscodeError;
use crate::job::JobId;

/// Segment file written next to the manifest by successful fake encodes.
pub const MOCK_SEGMENT_NAME: &str = "chunk-stream0-00001.m4s";

/// A recorded launch for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedLaunch {
    pub job_id: JobId,
    pub invocation: EncodeInvocation,
}

/// Mock implementation of the EncodeLauncher trait.
///
/// Provides controllable behavior for testing:
/// - Record every invocation
/// - Simulate exit codes or launch failures
/// - Hold fake processes open until released
/// - Write a small manifest and segment on success
///
/// # Example
///
/// ```rust,ignore
/// use dashpack_core::testing::MockLauncher;
///
/// let launcher = MockLauncher::new();
/// launcher.hold().await;
///
/// let id = coordinator.submit(input).await?;
/// // job is still encoding here
/// launcher.release().await;
/// coordinator.wait_for(&id).await?;
/// ```
#[derive(Debug)]
pub struct MockLauncher {
    launches: Arc<RwLock<Vec<RecordedLaunch>>>,
    /// Exit code of fake processes; `None` simulates a signal.
    exit_code: Arc<RwLock<Option<i32>>>,
    /// If set, launches fail with this message.
    launch_error: Arc<RwLock<Option<String>>>,
    write_artifacts: Arc<RwLock<bool>>,
    gate: watch::Sender<bool>,
}

impl Default for MockLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLauncher {
    /// Create a launcher whose processes exit 0 immediately.
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            launches: Arc::new(RwLock::new(Vec::new())),
            exit_code: Arc::new(RwLock::new(Some(0))),
            launch_error: Arc::new(RwLock::new(None)),
            write_artifacts: Arc::new(RwLock::new(true)),
            gate,
        }
    }

    /// Set the exit code for subsequent processes.
    pub async fn set_exit_code(&self, code: Option<i32>) {
        *self.exit_code.write().await = code;
    }

    /// Make subsequent launches fail.
    pub async fn set_launch_error(&self, message: impl Into<String>) {
        *self.launch_error.write().await = Some(message.into());
    }

    /// Enable or disable writing fake artifacts on success.
    pub async fn set_write_artifacts(&self, write: bool) {
        *self.write_artifacts.write().await = write;
    }

    /// Keep processes running until [`release`](Self::release) is called.
    pub async fn hold(&self) {
        self.gate.send_replace(false);
    }

    /// Let held and future processes exit.
    pub async fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Get all recorded launches.
    pub async fn recorded_launches(&self) -> Vec<RecordedLaunch> {
        self.launches.read().await.clone()
    }

    pub async fn launch_count(&self) -> usize {
        self.launches.read().await.len()
    }

    pub async fn last_invocation(&self) -> Option<EncodeInvocation> {
        self.launches
            .read()
            .await
            .last()
            .map(|l| l.invocation.clone())
    }
}

#[async_trait]
impl EncodeLauncher for MockLauncher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn launch(
        &self,
        job_id: &JobId,
        invocation: &EncodeInvocation,
    ) -> Result<Box<dyn EncodeProcess>, TranscodeError> {
        self.launches.write().await.push(RecordedLaunch {
            job_id: job_id.clone(),
            invocation: invocation.clone(),
        });

        if let Some(message) = self.launch_error.read().await.clone() {
            return Err(TranscodeError::Launch {
                program: PathBuf::from("mock-ffmpeg"),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, message),
            });
        }

        let artifacts = if *self.write_artifacts.read().await {
            Some((invocation.output.clone(), invocation.adaptation_sets.len()))
        } else {
            None
        };

        Ok(Box::new(MockProcess {
            code: *self.exit_code.read().await,
            gate: self.gate.subscribe(),
            artifacts,
        }))
    }
}

struct MockProcess {
    code: Option<i32>,
    gate: watch::Receiver<bool>,
    /// Manifest path and adaptation set count.
    artifacts: Option<(PathBuf, usize)>,
}

#[async_trait]
impl EncodeProcess for MockProcess {
    fn pid(&self) -> Option<u32> {
        None
    }

    async fn wait(&mut self) -> std::io::Result<ExitOutcome> {
        // A dropped launcher counts as released.
        let _ = self.gate.wait_for(|open| *open).await;

        if self.code != Some(0) {
            return Ok(ExitOutcome {
                code: self.code,
                stderr_tail: vec!["mock encoder failure".to_string()],
            });
        }

        if let Some((ref manifest, sets)) = self.artifacts {
            tokio::fs::write(manifest, fake_manifest(sets)).await?;
            if let Some(dir) = manifest.parent() {
                tokio::fs::write(dir.join(MOCK_SEGMENT_NAME), b"\x00\x00\x00\x18ftypiso6").await?;
            }
        }

        Ok(ExitOutcome::with_code(0))
    }
}

fn fake_manifest(adaptation_sets: usize) -> String {
    let sets: String = (0..adaptation_sets)
        .map(|id| format!("    <AdaptationSet id=\"{}\"/>\n", id))
        .collect();
    format!(
        "<?xml version=\"1.0\"?>\n<MPD xmlns=\"urn:mpeg:dash:schema:mpd:2011\" type=\"static\">\n  <Period id=\"0\">\n{}  </Period>\n</MPD>\n",
        sets
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::RenditionPlanner;
    use std::path::Path;
    use tempfile::TempDir;

    fn invocation(output: &Path, has_audio: bool) -> EncodeInvocation {
        RenditionPlanner::standard().plan(Path::new("/in.mp4"), has_audio, output)
    }

    #[tokio::test]
    async fn test_records_launches_and_exits_zero() {
        let temp = TempDir::new().unwrap();
        let manifest = temp.path().join("manifest.mpd");
        let launcher = MockLauncher::new();

        let mut process = launcher
            .launch(&JobId::generate(), &invocation(&manifest, true))
            .await
            .unwrap();
        let outcome = process.wait().await.unwrap();

        assert!(outcome.success());
        assert_eq!(launcher.launch_count().await, 1);
        let written = std::fs::read_to_string(&manifest).unwrap();
        assert_eq!(written.matches("<AdaptationSet").count(), 2);
        assert!(temp.path().join(MOCK_SEGMENT_NAME).exists());
    }

    #[tokio::test]
    async fn test_configured_exit_code() {
        let launcher = MockLauncher::new();
        launcher.set_exit_code(Some(1)).await;

        let mut process = launcher
            .launch(&JobId::generate(), &invocation(Path::new("/nowhere/m.mpd"), false))
            .await
            .unwrap();
        let outcome = process.wait().await.unwrap();
        assert_eq!(outcome.code, Some(1));
        assert!(!outcome.stderr_tail.is_empty());
    }

    #[tokio::test]
    async fn test_launch_error() {
        let launcher = MockLauncher::new();
        launcher.set_launch_error("missing binary").await;

        let result = launcher
            .launch(&JobId::generate(), &invocation(Path::new("/m.mpd"), false))
            .await;
        assert!(matches!(result, Err(TranscodeError::Launch { .. })));
        assert_eq!(launcher.launch_count().await, 1);
    }

    #[tokio::test]
    async fn test_hold_blocks_until_release() {
        let launcher = MockLauncher::new();
        launcher.set_write_artifacts(false).await;
        launcher.hold().await;

        let mut process = launcher
            .launch(&JobId::generate(), &invocation(Path::new("/m.mpd"), false))
            .await
            .unwrap();
        let waiter = tokio::spawn(async move { process.wait().await });

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        launcher.release().await;
        let outcome = waiter.await.unwrap().unwrap();
        assert!(outcome.success());
    }
}
