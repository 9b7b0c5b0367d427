//! Error types module
//!
//! All errors that reach the API surface are unified under [`AppError`]. Each
//! variant self-describes how it is presented to clients through
//! [`ErrorMetadata`]; processing failures carry their diagnostics internally
//! but only ever expose a generic client message.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like conflicts
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "NOT_FOUND")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Failed to start analysis process: {0}")]
    SpawnFailed(String),

    #[error("Analysis process exited with code {}: {stderr_tail}", exit_code.map(|c| c.to_string()).unwrap_or_else(|| "none (terminated by signal)".to_string()))]
    ExternalProcess {
        exit_code: Option<i32>,
        stderr_tail: String,
    },

    #[error("Analysis completed but expected artifacts are missing: {}", .0.join(", "))]
    ArtifactMissing(Vec<String>),

    #[error("Analysis process timed out after {after_secs}s")]
    ProcessTimeout { after_secs: u64 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Storage(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the file name exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Reduce file size and upload again"),
            false,
            LogLevel::Debug,
        ),
        AppError::Conflict(_) => (
            409,
            "PROCESSING_IN_PROGRESS",
            true,
            Some("Wait for the running analysis to finish and retry"),
            false,
            LogLevel::Warn,
        ),
        AppError::SpawnFailed(_) => (
            500,
            "ANALYSIS_UNAVAILABLE",
            false,
            Some("Contact the operator; the analysis step is misconfigured"),
            true,
            LogLevel::Error,
        ),
        AppError::ExternalProcess { .. } => (
            500,
            "ANALYSIS_FAILED",
            false,
            Some("Check the input file format and try again"),
            true,
            LogLevel::Error,
        ),
        AppError::ArtifactMissing(_) => (
            500,
            "ARTIFACT_MISSING",
            false,
            Some("Contact support if this error persists"),
            true,
            LogLevel::Error,
        ),
        AppError::ProcessTimeout { .. } => (
            500,
            "ANALYSIS_TIMEOUT",
            true,
            Some("Retry with a smaller input file"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::Conflict(_) => "Conflict",
            AppError::SpawnFailed(_) => "SpawnFailed",
            AppError::ExternalProcess { .. } => "ExternalProcess",
            AppError::ArtifactMissing(_) => "ArtifactMissing",
            AppError::ProcessTimeout { .. } => "ProcessTimeout",
            AppError::Storage(_) => "Storage",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::PayloadTooLarge(ref msg) => msg.clone(),
            AppError::Conflict(ref msg) => msg.clone(),
            AppError::SpawnFailed(_)
            | AppError::ExternalProcess { .. }
            | AppError::ArtifactMissing(_)
            | AppError::ProcessTimeout { .. } => "Failed to process the file".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_not_found() {
        let err = AppError::NotFound("File not found".to_string());
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert!(!err.is_recoverable());
        assert_eq!(err.client_message(), "File not found");
        assert!(!err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_processing_failures_hide_diagnostics() {
        let err = AppError::ExternalProcess {
            exit_code: Some(2),
            stderr_tail: "Traceback: KeyError '2theta'".to_string(),
        };
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "ANALYSIS_FAILED");
        assert!(err.is_sensitive());
        assert_eq!(err.client_message(), "Failed to process the file");
        assert!(!err.client_message().contains("Traceback"));
        assert!(err.to_string().contains("code 2"));
    }

    #[test]
    fn test_spawn_and_execution_failures_have_distinct_codes() {
        let spawn = AppError::SpawnFailed("No such file or directory".to_string());
        let exec = AppError::ExternalProcess {
            exit_code: Some(1),
            stderr_tail: String::new(),
        };
        assert_ne!(spawn.error_code(), exec.error_code());
        assert_eq!(spawn.http_status_code(), exec.http_status_code());
    }

    #[test]
    fn test_signal_exit_display() {
        let err = AppError::ExternalProcess {
            exit_code: None,
            stderr_tail: String::new(),
        };
        assert!(err.to_string().contains("terminated by signal"));
    }

    #[test]
    fn test_conflict_and_payload_statuses() {
        assert_eq!(AppError::Conflict("busy".into()).http_status_code(), 409);
        assert_eq!(AppError::PayloadTooLarge("big".into()).http_status_code(), 413);
        assert_eq!(AppError::InvalidInput("bad".into()).http_status_code(), 400);
    }

    #[test]
    fn test_artifact_missing_lists_files() {
        let err = AppError::ArtifactMissing(vec!["a-output.pdf".to_string()]);
        assert!(err.to_string().contains("a-output.pdf"));
        assert_eq!(err.error_code(), "ARTIFACT_MISSING");
    }

    #[test]
    fn test_io_error_maps_to_storage() {
        let err = AppError::from(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert_eq!(err.error_type(), "Storage");
        assert_eq!(err.http_status_code(), 500);
    }
}
