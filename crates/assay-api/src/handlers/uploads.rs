use crate::error::HttpAppError;
use crate::state::AppState;
use assay_core::constants::UPLOAD_FIELD_NAME;
use assay_core::UploadedFile;
use assay_processing::ValidationError;
use assay_storage::StorageError;
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use futures::TryStreamExt;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub file: UploadedFile,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Accept one file from the `file` field of a multipart body. Other fields are ignored.
#[tracing::instrument(skip_all, fields(operation = "upload_file"))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD_NAME) {
            continue;
        }

        let original_name = state.validator.normalize_original_name(field.file_name())?;
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let declared_size = field
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        state.validator.validate_declared_size(declared_size)?;

        let limit = state.ingestion.max_bytes();
        let stream = field.map_err(move |e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                StorageError::TooLarge { limit }
            } else {
                StorageError::UploadFailed(format!("Failed to read upload: {}", e.body_text()))
            }
        });

        let file = state
            .ingestion
            .ingest(
                UPLOAD_FIELD_NAME,
                &original_name,
                &mime_type,
                declared_size,
                stream,
            )
            .await?;

        tracing::info!(
            stored_name = %file.stored_name,
            size_bytes = file.size_bytes,
            mime_type = %file.mime_type,
            "File uploaded"
        );

        return Ok(Json(UploadResponse {
            message: "File uploaded successfully".to_string(),
            file,
        }));
    }

    Err(ValidationError::MissingFile.into())
}

pub async fn list_uploads(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let files = state.uploads.list().await?;
    Ok(Json(files))
}

#[tracing::instrument(skip(state), fields(operation = "get_upload"))]
pub async fn get_upload(
    State(state): State<Arc<AppState>>,
    Path(file_name): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let content = state.uploads.read_to_string(&file_name).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        content,
    ))
}

#[tracing::instrument(skip(state), fields(operation = "delete_upload"))]
pub async fn delete_upload(
    State(state): State<Arc<AppState>>,
    Path(file_name): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.uploads.delete(&file_name).await?;
    Ok(Json(MessageResponse {
        message: format!("File {} deleted successfully", file_name),
    }))
}
