//! Configuration validation
//!
//! Validates configuration at startup to catch misconfigurations early.

use anyhow::Result;
use assay_core::Config;

/// Validate configuration values, failing fast on anything that would break
/// the pipeline at request time.
pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    let is_production = config.is_production();
    let env_var = std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .ok();

    if is_production && env_var.is_none() {
        tracing::warn!(
            "Production mode detected but ENVIRONMENT/APP_ENV not set - error details may leak"
        );
    }

    if let Some(workdir) = config.analysis_workdir() {
        if !workdir.is_dir() {
            return Err(anyhow::anyhow!(
                "ANALYSIS_WORKDIR {} is not a directory",
                workdir.display()
            ));
        }
    }

    if config.request_timeout().is_some_and(|t| t < config.analysis_timeout()) {
        tracing::warn!(
            request_timeout_secs = config.request_timeout().map(|t| t.as_secs()),
            analysis_timeout_secs = config.analysis_timeout().as_secs(),
            "Request timeout is shorter than the analysis timeout; long runs will be cut off"
        );
    }

    Ok(())
}
