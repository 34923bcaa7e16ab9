//! Per-job output directories.

use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::TranscodeError;
use crate::job::JobId;

/// File name of the adaptive-streaming manifest inside a job directory.
pub const MANIFEST_FILE_NAME: &str = "manifest.mpd";

/// Allocates and resolves `<root>/<job_id>` directories.
#[derive(Debug, Clone)]
pub struct ArtifactNamespace {
    root: PathBuf,
}

impl ArtifactNamespace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory owned by `job_id`. Pure path derivation, no I/O.
    pub fn path_for(&self, job_id: &JobId) -> PathBuf {
        self.root.join(job_id.as_str())
    }

    /// Manifest location for `job_id`.
    pub fn manifest_path(&self, job_id: &JobId) -> PathBuf {
        self.path_for(job_id).join(MANIFEST_FILE_NAME)
    }

    /// Creates the job directory and any missing parents.
    ///
    /// An existing directory is not an error.
    pub async fn allocate(&self, job_id: &JobId) -> Result<PathBuf, TranscodeError> {
        let path = self.path_for(job_id);
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|source| TranscodeError::Resource {
                job_id: job_id.clone(),
                path: path.clone(),
                source,
            })?;
        debug!(job_id = %job_id, path = %path.display(), "Allocated output directory");
        Ok(path)
    }

    /// Resolves an artifact inside a job directory.
    ///
    /// `name` must be exactly one normal path component; anything else
    /// (separators, `..`, absolute paths, empty) resolves to `None`.
    pub fn resolve_artifact(&self, job_id: &JobId, name: &str) -> Option<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) if part == name => {
                Some(self.path_for(job_id).join(part))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_path_for_is_deterministic() {
        let ns = ArtifactNamespace::new("/video");
        let id = JobId::generate();
        assert_eq!(ns.path_for(&id), ns.path_for(&id));
        assert_eq!(ns.path_for(&id), PathBuf::from("/video").join(id.as_str()));
        assert_eq!(
            ns.manifest_path(&id),
            PathBuf::from("/video").join(id.as_str()).join("manifest.mpd")
        );
    }

    #[tokio::test]
    async fn test_allocate_creates_missing_parents() {
        let temp = TempDir::new().unwrap();
        let ns = ArtifactNamespace::new(temp.path().join("nested").join("video"));
        let id = JobId::generate();

        let path = ns.allocate(&id).await.unwrap();
        assert!(path.is_dir());
    }

    #[tokio::test]
    async fn test_allocate_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let ns = ArtifactNamespace::new(temp.path());
        let id = JobId::generate();

        let first = ns.allocate(&id).await.unwrap();
        let second = ns.allocate(&id).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_allocate_fails_on_file_collision() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("video");
        std::fs::write(&root, b"not a directory").unwrap();

        let ns = ArtifactNamespace::new(&root);
        let id = JobId::generate();
        let err = ns.allocate(&id).await.unwrap_err();

        assert!(matches!(err, TranscodeError::Resource { .. }));
        assert_eq!(err.job_id(), Some(&id));
    }

    #[tokio::test]
    async fn test_distinct_jobs_get_distinct_directories() {
        let temp = TempDir::new().unwrap();
        let ns = ArtifactNamespace::new(temp.path());

        let a = ns.allocate(&JobId::generate()).await.unwrap();
        let b = ns.allocate(&JobId::generate()).await.unwrap();
        assert_ne!(a, b);
        assert!(!a.starts_with(&b) && !b.starts_with(&a));
    }

    #[test]
    fn test_resolve_artifact_accepts_plain_names() {
        let ns = ArtifactNamespace::new("/video");
        let id = JobId::generate();
        assert_eq!(
            ns.resolve_artifact(&id, "chunk-stream0-00001.m4s"),
            Some(ns.path_for(&id).join("chunk-stream0-00001.m4s"))
        );
        assert_eq!(
            ns.resolve_artifact(&id, MANIFEST_FILE_NAME),
            Some(ns.manifest_path(&id))
        );
    }

    #[test]
    fn test_resolve_artifact_rejects_traversal() {
        let ns = ArtifactNamespace::new("/video");
        let id = JobId::generate();
        for name in ["", "..", ".", "../other/manifest.mpd", "a/b.m4s", "/etc/passwd", "./x"] {
            assert_eq!(ns.resolve_artifact(&id, name), None, "accepted {:?}", name);
        }
    }
}
