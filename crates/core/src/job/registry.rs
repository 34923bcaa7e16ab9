//! In-memory job registry.

use dashmap::DashMap;
use std::sync::Arc;

use super::types::{Job, JobEvent, JobId, JobStatus};
use crate::error::TranscodeError;

/// Shared mapping from job id to job state.
///
/// Updates lock only the shard holding the job being changed, so status
/// polling and completion of other jobs proceed concurrently.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<DashMap<JobId, Job>>,
}

/// Per-status job counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry for `job.id`.
    pub fn put(&self, job: Job) {
        self.jobs.insert(job.id.clone(), job);
    }

    /// Returns a snapshot of the job.
    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.jobs.get(id).map(|entry| entry.value().clone())
    }

    /// Like [`get`](Self::get), but with a not-found error.
    pub fn find(&self, id: &JobId) -> Result<Job, TranscodeError> {
        self.get(id)
            .ok_or_else(|| TranscodeError::NotFound(id.clone()))
    }

    /// Applies a lifecycle event to one job atomically and returns the new state.
    pub fn apply(&self, id: &JobId, event: &JobEvent) -> Result<Job, TranscodeError> {
        let mut entry = self
            .jobs
            .get_mut(id)
            .ok_or_else(|| TranscodeError::NotFound(id.clone()))?;
        entry.apply(event)?;
        Ok(entry.value().clone())
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.jobs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Snapshots every job, newest first.
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.iter().map(|e| e.value().clone()).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for entry in self.jobs.iter() {
            match entry.status() {
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}
