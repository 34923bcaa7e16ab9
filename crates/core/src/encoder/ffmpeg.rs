//! FFmpeg/FFprobe-backed inspector and launcher.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::config::EncoderConfig;
use super::planner::EncodeInvocation;
use super::traits::{EncodeLauncher, EncodeProcess, ExitOutcome, StreamInspector};
use crate::error::TranscodeError;
use crate::job::JobId;

/// Number of trailing stderr lines kept for failure diagnostics.
const STDERR_TAIL_LINES: usize = 20;

/// Audio detection through `ffprobe`.
pub struct FfprobeInspector {
    ffprobe_path: PathBuf,
}

impl FfprobeInspector {
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            ffprobe_path: config.ffprobe_path.clone(),
        }
    }

    /// Arguments selecting audio stream indexes, one per line, nothing else.
    fn probe_args(path: &Path) -> Vec<String> {
        vec![
            "-v".to_string(),
            "error".to_string(),
            "-select_streams".to_string(),
            "a".to_string(),
            "-show_entries".to_string(),
            "stream=index".to_string(),
            "-of".to_string(),
            "csv=p=0".to_string(),
            path.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl StreamInspector for FfprobeInspector {
    fn name(&self) -> &str {
        "ffprobe"
    }

    async fn probe_audio(&self, path: &Path) -> Result<bool, TranscodeError> {
        let output = Command::new(&self.ffprobe_path)
            .args(Self::probe_args(path))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                TranscodeError::probe_failed(format!(
                    "failed to run {}: {}",
                    self.ffprobe_path.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(TranscodeError::probe_failed(format!(
                "ffprobe exited with {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
    }
}

/// Spawns `ffmpeg` for an encode invocation.
pub struct FfmpegLauncher {
    config: EncoderConfig,
}

impl FfmpegLauncher {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Creates a launcher with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EncoderConfig::default())
    }

    /// Global options followed by the invocation's own arguments.
    fn build_args(&self, invocation: &EncodeInvocation) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-nostats".to_string(),
            "-y".to_string(),
            "-loglevel".to_string(),
            self.config.log_level.clone(),
        ];
        args.extend(self.config.extra_args.iter().cloned());
        args.extend(invocation.args());
        args
    }

    /// Checks that both ffmpeg and ffprobe can be executed.
    pub async fn validate(&self) -> Result<(), TranscodeError> {
        for program in [&self.config.ffmpeg_path, &self.config.ffprobe_path] {
            Command::new(program)
                .arg("-version")
                .stdin(Stdio::null())
                .output()
                .await
                .map_err(|source| TranscodeError::Launch {
                    program: program.clone(),
                    source,
                })?;
        }
        Ok(())
    }
}

#[async_trait]
impl EncodeLauncher for FfmpegLauncher {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn launch(
        &self,
        job_id: &JobId,
        invocation: &EncodeInvocation,
    ) -> Result<Box<dyn EncodeProcess>, TranscodeError> {
        let args = self.build_args(invocation);
        debug!(job_id = %job_id, args = ?args, "Spawning encoder");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| TranscodeError::Launch {
                program: self.config.ffmpeg_path.clone(),
                source,
            })?;

        info!(job_id = %job_id, pid = ?child.id(), "Encoder started");

        let stdout = child
            .stdout
            .take()
            .map(|out| tokio::spawn(drain_lines(out, job_id.clone(), "stdout", 0)));
        let stderr = child
            .stderr
            .take()
            .map(|err| tokio::spawn(drain_lines(err, job_id.clone(), "stderr", STDERR_TAIL_LINES)));

        Ok(Box::new(FfmpegProcess {
            child,
            stdout,
            stderr,
        }))
    }
}

/// A spawned ffmpeg whose output is being drained in the background.
struct FfmpegProcess {
    child: Child,
    stdout: Option<JoinHandle<Vec<String>>>,
    stderr: Option<JoinHandle<Vec<String>>>,
}

#[async_trait]
impl EncodeProcess for FfmpegProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(&mut self) -> std::io::Result<ExitOutcome> {
        let status = self.child.wait().await?;

        if let Some(handle) = self.stdout.take() {
            let _ = handle.await;
        }
        let stderr_tail = match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => Vec::new(),
        };

        Ok(ExitOutcome {
            code: status.code(),
            stderr_tail,
        })
    }
}

/// Reads `stream` to EOF, logging each line, and returns the last `keep` lines.
///
/// Lines are decoded lossily so non-UTF-8 output never stops the drain; a
/// closed pipe would kill the encoder on its next write.
async fn drain_lines<R>(stream: R, job_id: JobId, name: &'static str, keep: usize) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut tail = VecDeque::with_capacity(keep);

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                debug!(job_id = %job_id, stream = name, "{}", line);
                if keep > 0 {
                    if tail.len() == keep {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            Err(e) => {
                debug!(job_id = %job_id, stream = name, error = %e, "Stopped reading encoder output");
                break;
            }
        }
    }

    tail.into_iter().collect()
}
