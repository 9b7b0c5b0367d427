//! Service banner and health probes.

use crate::constants::{READINESS_CHECK_TIMEOUT_SECS, SERVICE_NAME};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use std::time::Duration;

pub async fn index() -> impl IntoResponse {
    format!("{} analysis service is running", SERVICE_NAME)
}

/// Liveness probe - process is running.
pub async fn liveness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "alive",
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_secs": state.started_at.elapsed().as_secs(),
        })),
    )
}

/// Readiness probe - both working directories accept writes.
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timeout = Duration::from_secs(READINESS_CHECK_TIMEOUT_SECS);

    let storage = match tokio::time::timeout(timeout, state.paths.check_writable()).await {
        Ok(Ok(())) => "ready".to_string(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Storage readiness check failed");
            format!("not_ready: {}", e)
        }
        Err(_) => {
            tracing::error!("Storage readiness check timed out");
            "timeout".to_string()
        }
    };

    let ready = storage == "ready";
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if ready { "ready" } else { "not_ready" },
            "storage": storage,
        })),
    )
}
