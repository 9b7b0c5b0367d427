use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

/// Which of the two artifacts an output file is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Image,
    Document,
}

impl Display for ArtifactKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ArtifactKind::Image => write!(f, "image"),
            ArtifactKind::Document => write!(f, "document"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputArtifact {
    pub job_id: String,
    pub kind: ArtifactKind,
    #[serde(skip)]
    pub path: PathBuf,
    /// Basename exposed to clients.
    pub filename: String,
}

/// Why a job ended in `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum JobFailure {
    /// The child could not be started at all.
    Spawn { message: String },
    /// The child ran and exited non-zero. `None` when killed by a signal.
    ExternalProcess { exit_code: Option<i32> },
    /// Exit 0 but at least one expected output is absent.
    ArtifactMissing { missing: Vec<String> },
    Timeout { after_secs: u64 },
}

impl Display for JobFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobFailure::Spawn { message } => write!(f, "spawn failed: {}", message),
            JobFailure::ExternalProcess { exit_code: Some(code) } => {
                write!(f, "exited with code {}", code)
            }
            JobFailure::ExternalProcess { exit_code: None } => write!(f, "terminated by signal"),
            JobFailure::ArtifactMissing { missing } => {
                write!(f, "missing artifacts: {}", missing.join(", "))
            }
            JobFailure::Timeout { after_secs } => write!(f, "timed out after {}s", after_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed(JobFailure),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed(_))
    }

    fn name(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed(_) => "failed",
        }
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobStatus::Failed(failure) => write!(f, "failed ({})", failure),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Rejected state change. The job is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid job transition from {from} to {to}")]
pub struct TransitionError {
    pub from: &'static str,
    pub to: &'static str,
}

/// One run of the external analysis step against a stored upload.
///
/// Created `Pending`, moves to `Running` once the child is spawned and then
/// takes exactly one terminal transition. Spawn failures go straight from
/// `Pending` to `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingJob {
    /// Stem of the stored input filename.
    pub id: String,
    #[serde(skip)]
    pub input_path: PathBuf,
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub artifacts: Vec<OutputArtifact>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ProcessingJob {
    pub fn new(id: impl Into<String>, input_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            input_path: input_path.into(),
            status: JobStatus::Pending,
            exit_code: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
            artifacts: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn mark_running(&mut self) -> Result<(), TransitionError> {
        if self.status != JobStatus::Pending {
            return Err(self.reject("running"));
        }
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Terminal success. Artifacts are stored image first, document second.
    pub fn succeed(&mut self, mut artifacts: Vec<OutputArtifact>) -> Result<(), TransitionError> {
        if self.status != JobStatus::Running {
            return Err(self.reject("succeeded"));
        }
        artifacts.sort_by_key(|a| match a.kind {
            ArtifactKind::Image => 0,
            ArtifactKind::Document => 1,
        });
        self.artifacts = artifacts;
        self.status = JobStatus::Succeeded;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self, failure: JobFailure) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(self.reject("failed"));
        }
        self.status = JobStatus::Failed(failure);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn artifact(&self, kind: ArtifactKind) -> Option<&OutputArtifact> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }

    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }

    fn reject(&self, to: &'static str) -> TransitionError {
        TransitionError {
            from: self.status.name(),
            to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(kind: ArtifactKind, ext: &str) -> OutputArtifact {
        OutputArtifact {
            job_id: "file-1-2".to_string(),
            kind,
            path: PathBuf::from(format!("/srv/outputs/file-1-2-output.{}", ext)),
            filename: format!("file-1-2-output.{}", ext),
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut job = ProcessingJob::new("file-1-2", "/srv/uploads/file-1-2.csv");
        assert_eq!(job.status, JobStatus::Pending);

        job.mark_running().unwrap();
        assert!(job.started_at.is_some());

        job.succeed(vec![
            artifact(ArtifactKind::Document, "pdf"),
            artifact(ArtifactKind::Image, "jpg"),
        ])
        .unwrap();

        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.artifacts.len(), 2);
        assert_eq!(job.artifacts[0].kind, ArtifactKind::Image);
        assert_eq!(job.artifacts[1].kind, ArtifactKind::Document);
        assert!(job.duration_ms().is_some());
    }

    #[test]
    fn test_terminal_state_is_immutable() {
        let mut job = ProcessingJob::new("file-1-2", "/tmp/in.csv");
        job.mark_running().unwrap();
        job.fail(JobFailure::ExternalProcess { exit_code: Some(2) })
            .unwrap();

        let err = job.succeed(Vec::new()).unwrap_err();
        assert_eq!(err.from, "failed");
        assert!(job
            .fail(JobFailure::Timeout { after_secs: 1 })
            .is_err());
        assert!(job.mark_running().is_err());
        assert_eq!(
            job.status,
            JobStatus::Failed(JobFailure::ExternalProcess { exit_code: Some(2) })
        );
    }

    #[test]
    fn test_spawn_failure_from_pending() {
        let mut job = ProcessingJob::new("file-1-2", "/tmp/in.csv");
        job.fail(JobFailure::Spawn {
            message: "not found".to_string(),
        })
        .unwrap();
        assert!(job.status.is_terminal());
        assert!(job.started_at.is_none());
    }

    #[test]
    fn test_cannot_succeed_without_running() {
        let mut job = ProcessingJob::new("file-1-2", "/tmp/in.csv");
        assert!(job.succeed(Vec::new()).is_err());
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(JobStatus::Running.to_string(), "running");
        assert_eq!(
            JobStatus::Failed(JobFailure::ExternalProcess { exit_code: None }).to_string(),
            "failed (terminated by signal)"
        );
    }
}
