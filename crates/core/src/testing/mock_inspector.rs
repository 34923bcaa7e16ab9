//! Mock stream inspector for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::encoder::StreamInspector;
use crate::error::TranscodeError;

/// Mock implementation of the StreamInspector trait.
///
/// Answers "no audio" by default. Every probed path is recorded.
///
/// # Example
///
/// ```rust,ignore
/// use dashpack_core::testing::MockInspector;
///
/// let inspector = MockInspector::new();
/// inspector.set_has_audio(true).await;
///
/// assert!(inspector.has_audio(Path::new("/uploads/clip.mp4")).await);
/// assert_eq!(inspector.probed_paths().await.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockInspector {
    has_audio: Arc<RwLock<bool>>,
    /// If set, every probe fails with this reason.
    failure: Arc<RwLock<Option<String>>>,
    probed: Arc<RwLock<Vec<PathBuf>>>,
}

impl MockInspector {
    /// Create a new mock inspector that reports no audio.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock inspector that reports audio for every input.
    pub fn with_audio() -> Self {
        Self {
            has_audio: Arc::new(RwLock::new(true)),
            ..Default::default()
        }
    }

    /// Set the answer for subsequent probes.
    pub async fn set_has_audio(&self, has_audio: bool) {
        *self.has_audio.write().await = has_audio;
    }

    /// Make subsequent probes fail.
    pub async fn set_probe_failure(&self, reason: impl Into<String>) {
        *self.failure.write().await = Some(reason.into());
    }

    /// Clear any configured failure.
    pub async fn clear_probe_failure(&self) {
        *self.failure.write().await = None;
    }

    /// Paths probed so far, in order.
    pub async fn probed_paths(&self) -> Vec<PathBuf> {
        self.probed.read().await.clone()
    }
}

#[async_trait]
impl StreamInspector for MockInspector {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe_audio(&self, path: &Path) -> Result<bool, TranscodeError> {
        self.probed.write().await.push(path.to_path_buf());

        if let Some(reason) = self.failure.read().await.clone() {
            return Err(TranscodeError::probe_failed(reason));
        }

        Ok(*self.has_audio.read().await)
    }
}
