use crate::error::HttpAppError;
use crate::handlers::uploads::MessageResponse;
use crate::state::AppState;
use assay_core::AppError;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, Response, StatusCode},
    response::IntoResponse,
    Json,
};
use futures::StreamExt;
use std::sync::Arc;

fn content_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "csv" => "text/csv",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

pub async fn list_outputs(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let files = state.outputs.list().await?;
    Ok(Json(files))
}

/// Stream an artifact back as an attachment.
#[tracing::instrument(skip(state), fields(operation = "download_output"))]
pub async fn download_output(
    State(state): State<Arc<AppState>>,
    Path(file_name): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let (size, stream) = state.outputs.open_stream(&file_name).await?;

    tracing::debug!(file_name = %file_name, size_bytes = size, "Streaming output");

    let body_stream = stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let content_disposition = format!("attachment; filename=\"{}\"", file_name.replace('"', ""));

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&file_name))
        .header(header::CONTENT_DISPOSITION, content_disposition.as_str())
        .header(header::CONTENT_LENGTH, size)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body_stream))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

#[tracing::instrument(skip(state), fields(operation = "delete_output"))]
pub async fn delete_output(
    State(state): State<Arc<AppState>>,
    Path(file_name): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.outputs.delete(&file_name).await?;
    Ok(Json(MessageResponse {
        message: format!("File {} deleted successfully", file_name),
    }))
}
