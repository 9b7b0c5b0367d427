use crate::error::{failed_job_error, HttpAppError};
use crate::state::AppState;
use assay_core::{AppError, ArtifactKind, JobStatus};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct ProcessOutputs {
    pub image: String,
    pub document: String,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub message: String,
    pub job_id: String,
    pub outputs: ProcessOutputs,
}

/// Run the analysis step on a stored upload and wait for it to finish.
#[tracing::instrument(skip(state), fields(operation = "process_file"))]
pub async fn process_file(
    State(state): State<Arc<AppState>>,
    Path(file_name): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let input = state.uploads.resolve(&file_name)?;
    if !state.uploads.exists(&file_name).await? {
        return Err(AppError::NotFound(format!("File not found: {}", file_name)).into());
    }

    let job = state.orchestrator.process(&input).await?;

    if job.status != JobStatus::Succeeded {
        return Err(failed_job_error(&job));
    }

    let filename_of = |kind: ArtifactKind| {
        job.artifact(kind)
            .map(|a| a.filename.clone())
            .ok_or_else(|| AppError::Internal(format!("Job {} has no {} artifact", job.id, kind)))
    };
    let outputs = ProcessOutputs {
        image: filename_of(ArtifactKind::Image)?,
        document: filename_of(ArtifactKind::Document)?,
    };

    tracing::info!(
        job_id = %job.id,
        duration_ms = job.duration_ms(),
        image = %outputs.image,
        document = %outputs.document,
        "File processed"
    );

    Ok(Json(ProcessResponse {
        message: "File processed successfully".to_string(),
        job_id: job.id.clone(),
        outputs,
    }))
}
