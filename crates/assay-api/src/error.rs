//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Domain errors
//! from the storage and processing crates convert into `HttpAppError` so every
//! failure renders with the same body shape, status mapping and logging.

use assay_core::{AppError, ErrorMetadata, JobFailure, JobStatus, LogLevel, ProcessingJob};
use assay_processing::{ProcessingError, ValidationError};
use assay_storage::StorageError;
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Stderr lines kept in the server-side error for a failed run
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from assay-core)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;
        let is_production = is_production_env();

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        // Details only outside production, and never for sensitive errors.
        let (details, error_type) = if is_production || app_error.is_sensitive() {
            (None, None)
        } else {
            (
                Some(app_error.detailed_message()),
                Some(app_error.error_type().to_string()),
            )
        };

        let body = Json(ErrorResponse {
            error: app_error.client_message(),
            details,
            error_type,
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
        });

        (status, body).into_response()
    }
}

// Convert domain errors to HttpAppError (avoids orphan rule: we impl for local HttpAppError)

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        let app = match err {
            StorageError::NotFound(name) => AppError::NotFound(format!("File not found: {}", name)),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::TooLarge { limit } => AppError::PayloadTooLarge(format!(
                "File exceeds the maximum upload size of {} bytes",
                limit
            )),
            StorageError::EmptyUpload => AppError::InvalidInput("Uploaded file is empty".to_string()),
            StorageError::UploadFailed(msg)
            | StorageError::DownloadFailed(msg)
            | StorageError::DeleteFailed(msg) => AppError::Storage(msg),
            StorageError::IoError(err) => AppError::Storage(format!("IO error: {}", err)),
            StorageError::ConfigError(msg) => AppError::Internal(msg),
        };
        HttpAppError(app)
    }
}

impl From<ValidationError> for HttpAppError {
    fn from(err: ValidationError) -> Self {
        let app = match err {
            ValidationError::FileTooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            ValidationError::MissingFile
            | ValidationError::EmptyFile
            | ValidationError::InvalidFilename(_) => AppError::InvalidInput(err.to_string()),
        };
        HttpAppError(app)
    }
}

impl From<ProcessingError> for HttpAppError {
    fn from(err: ProcessingError) -> Self {
        let app = match err {
            ProcessingError::Conflict(job_id) => AppError::Conflict(format!(
                "File {} is already being processed",
                job_id
            )),
            ProcessingError::InputMissing(job_id) => {
                AppError::NotFound(format!("File not found: {}", job_id))
            }
            ProcessingError::InvalidInput(msg) => AppError::InvalidInput(msg),
            ProcessingError::Storage(err) => return HttpAppError::from(err),
            ProcessingError::ShuttingDown
            | ProcessingError::TaskFailed(_)
            | ProcessingError::Transition(_) => {
                AppError::Internal(err.to_string())
            }
        };
        HttpAppError(app)
    }
}

impl From<MultipartError> for HttpAppError {
    fn from(err: MultipartError) -> Self {
        let app = if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(err.body_text())
        } else {
            AppError::InvalidInput(format!("Invalid multipart body: {}", err.body_text()))
        };
        HttpAppError(app)
    }
}

/// Error for a job that ended in `Failed`. Diagnostics stay in the error
/// (logged server-side); clients only see the generic message.
pub fn failed_job_error(job: &ProcessingJob) -> HttpAppError {
    let app = match &job.status {
        JobStatus::Failed(JobFailure::Spawn { message }) => AppError::SpawnFailed(message.clone()),
        JobStatus::Failed(JobFailure::ExternalProcess { exit_code }) => {
            let start = job.stderr.len().saturating_sub(STDERR_TAIL_LINES);
            AppError::ExternalProcess {
                exit_code: *exit_code,
                stderr_tail: job.stderr[start..].join("\n"),
            }
        }
        JobStatus::Failed(JobFailure::ArtifactMissing { missing }) => {
            AppError::ArtifactMissing(missing.clone())
        }
        JobStatus::Failed(JobFailure::Timeout { after_secs }) => AppError::ProcessTimeout {
            after_secs: *after_secs,
        },
        other => AppError::Internal(format!("Job {} ended in unexpected state {}", job.id, other)),
    };
    HttpAppError(app)
}
