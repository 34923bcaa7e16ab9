//! Transcode coordinator: owns the job lifecycle from submission to cleanup.

use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::encoder::{EncodeLauncher, EncodeProcess, RenditionPlanner, StreamInspector};
use crate::error::TranscodeError;
use crate::job::{Job, JobEvent, JobId, JobRegistry};
use crate::metrics;
use crate::namespace::ArtifactNamespace;

/// Notifications emitted while jobs progress.
#[derive(Debug, Clone)]
pub enum JobUpdate {
    /// A job was registered or changed phase. Carries the new snapshot.
    StatusChanged(Job),
    /// The input of a completed job could not be removed. The job stays completed.
    CleanupFailed {
        job_id: JobId,
        path: PathBuf,
        error: String,
    },
}

/// Observer invoked for every [`JobUpdate`].
pub type JobUpdateCallback = Arc<dyn Fn(&JobUpdate) + Send + Sync>;

/// Registry writes plus update notification, shared with supervisor tasks.
#[derive(Clone)]
struct Tracker {
    registry: JobRegistry,
    on_update: Option<JobUpdateCallback>,
}

impl Tracker {
    fn notify(&self, update: JobUpdate) {
        if let Some(ref callback) = self.on_update {
            callback(&update);
        }
    }

    fn register(&self, job: Job) {
        self.registry.put(job.clone());
        self.notify(JobUpdate::StatusChanged(job));
    }

    /// Applies `event` and records terminal outcomes. Rejected events are logged.
    fn apply(&self, job_id: &JobId, event: JobEvent) -> Option<Job> {
        match self.registry.apply(job_id, &event) {
            Ok(job) => {
                if job.status().is_terminal() {
                    metrics::JOBS_FINISHED
                        .with_label_values(&[job.status().as_str()])
                        .inc();
                    if let Some(reason) = failure_reason(&event) {
                        metrics::JOB_FAILURES.with_label_values(&[reason]).inc();
                    }
                }
                debug!(job_id = %job_id, phase = %job.phase, message = %job.message, "Job updated");
                self.notify(JobUpdate::StatusChanged(job.clone()));
                Some(job)
            }
            Err(e) => {
                warn!(job_id = %job_id, event = event.name(), error = %e, "Job update rejected");
                None
            }
        }
    }
}

fn failure_reason(event: &JobEvent) -> Option<&'static str> {
    match event {
        JobEvent::NamespaceFailed { .. } => Some("resource"),
        JobEvent::LaunchFailed { .. } => Some("launch"),
        JobEvent::Exited { code: Some(0) } => None,
        JobEvent::Exited { .. } => Some("encode"),
        JobEvent::SupervisionFailed { .. } => Some("supervision"),
        JobEvent::AudioChecked { .. } => None,
    }
}

/// Drives jobs through inspection, planning, encoding and cleanup.
///
/// `submit` returns once the encoder is running; each encoder is then
/// supervised by its own task, which records the outcome in the registry.
pub struct TranscodeCoordinator<I = dyn StreamInspector, L = dyn EncodeLauncher>
where
    I: StreamInspector + ?Sized,
    L: EncodeLauncher + ?Sized,
{
    tracker: Tracker,
    namespace: ArtifactNamespace,
    planner: RenditionPlanner,
    inspector: Arc<I>,
    launcher: Arc<L>,
    tasks: DashMap<JobId, JoinHandle<()>>,
}

impl<I, L> TranscodeCoordinator<I, L>
where
    I: StreamInspector + ?Sized + 'static,
    L: EncodeLauncher + ?Sized + 'static,
{
    /// Creates a coordinator writing job directories under `namespace`.
    pub fn new(namespace: ArtifactNamespace, inspector: Arc<I>, launcher: Arc<L>) -> Self {
        Self {
            tracker: Tracker {
                registry: JobRegistry::new(),
                on_update: None,
            },
            namespace,
            planner: RenditionPlanner::standard(),
            inspector,
            launcher,
            tasks: DashMap::new(),
        }
    }

    /// Sets the observer for job updates.
    pub fn with_update_callback(mut self, callback: JobUpdateCallback) -> Self {
        self.tracker.on_update = Some(callback);
        self
    }

    /// Replaces the rendition planner.
    pub fn with_planner(mut self, planner: RenditionPlanner) -> Self {
        self.planner = planner;
        self
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.tracker.registry
    }

    pub fn namespace(&self) -> &ArtifactNamespace {
        &self.namespace
    }

    /// Submits an input for transcoding.
    ///
    /// Returns the job id once the encoder has been started, or once the job
    /// has failed to launch. The only synchronous error is an output directory
    /// that cannot be created; the job is still registered as failed in that case.
    pub async fn submit(&self, input: impl Into<PathBuf>) -> Result<JobId, TranscodeError> {
        let input = input.into();
        let job_id = JobId::generate();
        let output_dir = self.namespace.path_for(&job_id);

        self.tracker
            .register(Job::new(job_id.clone(), input.clone(), output_dir));
        metrics::JOBS_SUBMITTED.inc();
        info!(job_id = %job_id, input = %input.display(), "Job submitted");

        self.tasks.retain(|_, handle| !handle.is_finished());

        if let Err(e) = self.namespace.allocate(&job_id).await {
            error!(job_id = %job_id, error = %e, "Could not allocate output directory");
            let error = match &e {
                TranscodeError::Resource { path, source, .. } => {
                    format!("{}: {}", path.display(), source)
                }
                other => other.to_string(),
            };
            self.tracker
                .apply(&job_id, JobEvent::NamespaceFailed { error });
            return Err(e);
        }

        let has_audio = self.inspector.has_audio(&input).await;
        metrics::AUDIO_DETECTION
            .with_label_values(&[if has_audio { "present" } else { "absent" }])
            .inc();
        debug!(job_id = %job_id, inspector = self.inspector.name(), has_audio, "Audio check finished");
        self.tracker
            .apply(&job_id, JobEvent::AudioChecked { has_audio });

        let invocation =
            self.planner
                .plan(&input, has_audio, &self.namespace.manifest_path(&job_id));

        let process = match self.launcher.launch(&job_id, &invocation).await {
            Ok(process) => process,
            Err(e) => {
                error!(job_id = %job_id, launcher = self.launcher.name(), error = %e, "Encoder failed to start");
                self.tracker.apply(
                    &job_id,
                    JobEvent::LaunchFailed {
                        error: e.to_string(),
                    },
                );
                return Ok(job_id);
            }
        };

        metrics::JOBS_ENCODING.inc();
        info!(job_id = %job_id, pid = ?process.pid(), has_audio, "Encoding started");

        let handle = tokio::spawn(supervise(
            self.tracker.clone(),
            job_id.clone(),
            input,
            process,
        ));
        self.tasks.insert(job_id.clone(), handle);

        Ok(job_id)
    }

    /// Current state of a job.
    pub fn query_status(&self, job_id: &JobId) -> Result<Job, TranscodeError> {
        self.tracker.registry.find(job_id)
    }

    /// All jobs, newest first.
    pub fn list_jobs(&self) -> Vec<Job> {
        self.tracker.registry.list()
    }

    /// Waits until the job's encoder has exited and its outcome is recorded.
    pub async fn wait_for(&self, job_id: &JobId) -> Result<Job, TranscodeError> {
        if let Some((_, handle)) = self.tasks.remove(job_id) {
            if let Err(e) = handle.await {
                warn!(job_id = %job_id, error = %e, "Supervisor task ended abnormally");
            }
        }
        self.query_status(job_id)
    }

    /// Waits for every outstanding supervisor task.
    pub async fn shutdown(&self) {
        let ids: Vec<JobId> = self.tasks.iter().map(|e| e.key().clone()).collect();
        let handles: Vec<JoinHandle<()>> = ids
            .iter()
            .filter_map(|id| self.tasks.remove(id).map(|(_, handle)| handle))
            .collect();

        if handles.is_empty() {
            return;
        }

        info!(count = handles.len(), "Waiting for running encodes to finish");
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "Supervisor task ended abnormally");
            }
        }
    }
}

/// Waits for one encoder and records how it ended.
async fn supervise(
    tracker: Tracker,
    job_id: JobId,
    input: PathBuf,
    mut process: Box<dyn EncodeProcess>,
) {
    let started = Instant::now();
    let outcome = process.wait().await;
    metrics::JOBS_ENCODING.dec();

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(job_id = %job_id, error = %e, "Lost track of encoder");
            tracker.apply(
                &job_id,
                JobEvent::SupervisionFailed {
                    error: e.to_string(),
                },
            );
            return;
        }
    };

    let elapsed = started.elapsed().as_secs_f64();

    if !outcome.success() {
        metrics::ENCODE_DURATION
            .with_label_values(&["failed"])
            .observe(elapsed);
        warn!(
            job_id = %job_id,
            code = ?outcome.code,
            stderr = %outcome.stderr_tail.join("\n"),
            "Encoder failed, keeping input"
        );
        tracker.apply(&job_id, JobEvent::Exited { code: outcome.code });
        return;
    }

    metrics::ENCODE_DURATION
        .with_label_values(&["completed"])
        .observe(elapsed);
    info!(job_id = %job_id, elapsed_secs = elapsed, "Encoding completed");

    // Input is gone before anyone can observe `completed`
    if let Err(e) = tokio::fs::remove_file(&input).await {
        warn!(job_id = %job_id, path = %input.display(), error = %e, "Failed to remove input");
        metrics::CLEANUP_FAILURES.inc();
        tracker.notify(JobUpdate::CleanupFailed {
            job_id: job_id.clone(),
            path: input,
            error: e.to_string(),
        });
    }

    tracker.apply(&job_id, JobEvent::Exited { code: outcome.code });
}
