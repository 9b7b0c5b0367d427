//! Application setup and initialization

pub mod routes;
pub mod server;
pub mod validation;

use crate::state::AppState;
use anyhow::{Context, Result};
use assay_core::Config;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    crate::telemetry::init_telemetry(config.environment())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    build_app(config).await
}

/// Validate configuration, prepare storage and build the router.
///
/// Does not install a tracing subscriber, so tests can call it repeatedly.
pub async fn build_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Validate configuration first - fail fast on misconfiguration
    validation::validate_config(&config).context("Configuration validation failed")?;

    tracing::info!("Configuration loaded and validated successfully");

    let stores = assay_storage::create_stores(&config)
        .await
        .context("Failed to prepare storage directories")?;

    let state = Arc::new(AppState::new(config.clone(), stores));

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
