//! Uploads and outputs directories.

use crate::traits::{StorageError, StorageResult};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Absolute locations of the two working directories.
///
/// Both are created at start-up; writers call the `ensure_*` methods before
/// each write in case a directory was removed underneath the running process.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    uploads: PathBuf,
    outputs: PathBuf,
}

impl StoragePaths {
    pub async fn init(
        upload_dir: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> StorageResult<Self> {
        let uploads = prepare_dir(upload_dir.as_ref()).await?;
        let outputs = prepare_dir(output_dir.as_ref()).await?;

        if uploads == outputs {
            return Err(StorageError::ConfigError(
                "Upload and output directories must differ".to_string(),
            ));
        }

        tracing::info!(
            uploads = %uploads.display(),
            outputs = %outputs.display(),
            "Storage directories ready"
        );

        Ok(Self { uploads, outputs })
    }

    pub fn uploads(&self) -> &Path {
        &self.uploads
    }

    pub fn outputs(&self) -> &Path {
        &self.outputs
    }

    pub async fn ensure_uploads(&self) -> StorageResult<()> {
        ensure_dir(&self.uploads).await
    }

    pub async fn ensure_outputs(&self) -> StorageResult<()> {
        ensure_dir(&self.outputs).await
    }

    /// Write and remove a probe file in both directories.
    pub async fn check_writable(&self) -> StorageResult<()> {
        probe(&self.uploads).await?;
        probe(&self.outputs).await
    }
}

async fn prepare_dir(dir: &Path) -> StorageResult<PathBuf> {
    fs::create_dir_all(dir).await.map_err(|e| {
        StorageError::ConfigError(format!(
            "Failed to create storage directory {}: {}",
            dir.display(),
            e
        ))
    })?;
    fs::canonicalize(dir).await.map_err(|e| {
        StorageError::ConfigError(format!(
            "Failed to canonicalize storage directory {}: {}",
            dir.display(),
            e
        ))
    })
}

async fn ensure_dir(dir: &Path) -> StorageResult<()> {
    if fs::try_exists(dir).await.unwrap_or(false) {
        return Ok(());
    }
    tracing::warn!(path = %dir.display(), "Storage directory missing, recreating");
    fs::create_dir_all(dir).await?;
    Ok(())
}

async fn probe(dir: &Path) -> StorageResult<()> {
    let probe = dir.join(format!(".probe-{}", crate::naming::generate_id()));
    fs::write(&probe, b"ok").await.map_err(|e| {
        StorageError::ConfigError(format!("Directory {} is not writable: {}", dir.display(), e))
    })?;
    fs::remove_file(&probe).await?;
    Ok(())
}
