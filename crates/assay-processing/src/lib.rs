//! Assay Processing Library
//!
//! Runs the external analysis step against stored uploads. The orchestrator
//! owns the job state machine: it serializes runs per job id, spawns the
//! configured program, captures its output, enforces the timeout and checks
//! that the expected artifacts were written.

pub mod capture;
pub mod orchestrator;
pub mod runner;
pub mod validator;

// Re-export commonly used types
pub use capture::CaptureBuffer;
pub use orchestrator::{OrchestratorConfig, ProcessingError, ProcessingOrchestrator};
pub use runner::{CommandSpec, ExitKind, FinishedProcess, RunningProcess};
pub use validator::{UploadValidator, ValidationError};
