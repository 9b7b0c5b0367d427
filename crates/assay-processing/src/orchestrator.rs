//! Processing orchestrator
//!
//! Drives one `ProcessingJob` per call from `Pending` to a terminal state.
//! At most one run per job id is in flight at any time; a second request for
//! the same input is rejected with [`ProcessingError::Conflict`] instead of
//! spawning a child that would write the same output files. Runs for
//! different job ids proceed concurrently up to `max_concurrent_jobs`.

use crate::runner::{CommandSpec, ExitKind, RunningProcess};
use assay_core::{
    ArtifactKind, Config, JobFailure, OutputArtifact, ProcessingJob, TransitionError,
};
use assay_storage::{naming, StorageError, StoragePaths};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::Instrument;

/// Stderr lines included in failure logs
const STDERR_TAIL_LINES: usize = 20;

/// Rejections that happen before a job is run
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Processing already in progress for {0}")]
    Conflict(String),

    #[error("Input file not found: {0}")]
    InputMissing(String),

    #[error("Invalid input path: {0}")]
    InvalidInput(String),

    #[error("Processing is shutting down")]
    ShuttingDown,

    #[error("Processing task failed: {0}")]
    TaskFailed(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub command: CommandSpec,
    pub timeout: Duration,
    pub image_extension: String,
    pub document_extension: String,
    pub max_concurrent_jobs: usize,
}

impl OrchestratorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            command: CommandSpec {
                program: config.analysis_program().to_string(),
                args: config.analysis_args().to_vec(),
                workdir: config.analysis_workdir().cloned(),
                capture_max_lines: config.capture_max_lines(),
            },
            timeout: config.analysis_timeout(),
            image_extension: config.output_image_extension().to_string(),
            document_extension: config.output_document_extension().to_string(),
            max_concurrent_jobs: config.max_concurrent_jobs(),
        }
    }
}

/// Removes its job id from the in-flight set when dropped, including on
/// panic or when the owning future is cancelled.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    job_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.job_id);
    }
}

#[derive(Clone)]
pub struct ProcessingOrchestrator {
    config: Arc<OrchestratorConfig>,
    paths: StoragePaths,
    in_flight: Arc<Mutex<HashSet<String>>>,
    permits: Arc<Semaphore>,
}

impl ProcessingOrchestrator {
    pub fn new(config: OrchestratorConfig, paths: StoragePaths) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        Self {
            config: Arc::new(config),
            paths,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            permits,
        }
    }

    /// Job id for a stored input
    pub fn job_id_for(input: &Path) -> Result<String, ProcessingError> {
        input
            .file_name()
            .and_then(|n| n.to_str())
            .map(|name| naming::job_id(name).to_string())
            .ok_or_else(|| ProcessingError::InvalidInput(input.display().to_string()))
    }

    /// Expected output paths for a job id, image first.
    pub fn output_paths(&self, job_id: &str) -> (PathBuf, PathBuf) {
        let outputs = self.paths.outputs();
        (
            outputs.join(naming::output_name(job_id, &self.config.image_extension)),
            outputs.join(naming::output_name(job_id, &self.config.document_extension)),
        )
    }

    pub fn is_in_flight(&self, job_id: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(job_id)
    }

    /// Run the analysis step against `input` and return the job in its
    /// terminal state.
    ///
    /// `Err` is returned only when the job was never started (conflict,
    /// missing input) or its task panicked. Failures of the run itself come back as
    /// `Ok(job)` with `JobStatus::Failed`.
    ///
    /// Once accepted, the run happens on its own task: dropping the returned
    /// future (client disconnect, request timeout) does not stop the child,
    /// and the job still reaches a terminal state and is logged.
    #[tracing::instrument(skip_all, fields(input = %input.display()))]
    pub async fn process(&self, input: &Path) -> Result<ProcessingJob, ProcessingError> {
        let job_id = Self::job_id_for(input)?;

        match tokio::fs::metadata(input).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(ProcessingError::InputMissing(job_id)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ProcessingError::InputMissing(job_id))
            }
            Err(e) => return Err(StorageError::IoError(e).into()),
        }

        let guard = self.try_acquire(&job_id)?;
        let orchestrator = self.clone();
        let input = input.to_path_buf();
        let run = async move {
            let _guard = guard;
            orchestrator.run(job_id, &input).await
        };

        tokio::spawn(run.instrument(tracing::Span::current()))
            .await
            .map_err(|e| ProcessingError::TaskFailed(e.to_string()))?
    }

    async fn run(&self, job_id: String, input: &Path) -> Result<ProcessingJob, ProcessingError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ProcessingError::ShuttingDown)?;

        let (image_path, document_path) = self.output_paths(&job_id);
        self.paths.ensure_outputs().await?;
        remove_stale(&image_path).await?;
        remove_stale(&document_path).await?;

        let mut job = ProcessingJob::new(job_id.clone(), input);

        let running = match RunningProcess::spawn(
            &self.config.command,
            &job_id,
            [input, image_path.as_path(), document_path.as_path()],
        ) {
            Ok(running) => running,
            Err(e) => {
                tracing::error!(
                    job_id = %job_id,
                    program = %self.config.command.program,
                    error = %e,
                    "Failed to start analysis process"
                );
                job.fail(JobFailure::Spawn {
                    message: e.to_string(),
                })?;
                return Ok(job);
            }
        };
        job.mark_running()?;

        let finished = running.finish(self.config.timeout).await;
        let stderr_tail = finished.stderr.tail(STDERR_TAIL_LINES);
        let duration_ms = finished.elapsed.as_millis() as u64;

        job.stdout = finished.stdout.into_lines();
        job.stderr = finished.stderr.into_lines();

        match finished.exit {
            ExitKind::TimedOut => {
                tracing::error!(
                    job_id = %job_id,
                    duration_ms = duration_ms,
                    stderr = %stderr_tail,
                    "Analysis process timed out"
                );
                job.fail(JobFailure::Timeout {
                    after_secs: self.config.timeout.as_secs(),
                })?;
            }
            ExitKind::Exited(Some(0)) => {
                job.exit_code = Some(0);
                let expected = [
                    (ArtifactKind::Image, image_path),
                    (ArtifactKind::Document, document_path),
                ];

                let mut artifacts = Vec::with_capacity(expected.len());
                let mut missing = Vec::new();
                for (kind, path) in expected {
                    let filename = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    if is_file(&path).await {
                        artifacts.push(OutputArtifact {
                            job_id: job_id.clone(),
                            kind,
                            path,
                            filename,
                        });
                    } else {
                        missing.push(filename);
                    }
                }

                if missing.is_empty() {
                    job.succeed(artifacts)?;
                    tracing::info!(
                        job_id = %job_id,
                        duration_ms = duration_ms,
                        "Analysis completed"
                    );
                } else {
                    tracing::error!(
                        job_id = %job_id,
                        missing = ?missing,
                        duration_ms = duration_ms,
                        "Analysis exited cleanly but artifacts are missing"
                    );
                    job.fail(JobFailure::ArtifactMissing { missing })?;
                }
            }
            ExitKind::Exited(exit_code) => {
                job.exit_code = exit_code;
                tracing::error!(
                    job_id = %job_id,
                    exit_code = ?exit_code,
                    duration_ms = duration_ms,
                    stderr = %stderr_tail,
                    "Analysis process failed"
                );
                job.fail(JobFailure::ExternalProcess { exit_code })?;
            }
        }

        Ok(job)
    }

    fn try_acquire(&self, job_id: &str) -> Result<InFlightGuard, ProcessingError> {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(job_id.to_string()) {
            tracing::warn!(job_id = %job_id, "Rejected concurrent processing request");
            return Err(ProcessingError::Conflict(job_id.to_string()));
        }
        Ok(InFlightGuard {
            set: Arc::clone(&self.in_flight),
            job_id: job_id.to_string(),
        })
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

async fn remove_stale(path: &Path) -> Result<(), StorageError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed stale output");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::DeleteFailed(format!(
            "Failed to remove stale output {}: {}",
            path.display(),
            e
        ))),
    }
}
