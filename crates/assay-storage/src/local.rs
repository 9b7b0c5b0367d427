use crate::guard;
use crate::traits::{ByteStream, FileStore, StorageError, StorageResult};
use assay_core::constants::PARTIAL_EXTENSION;
use async_trait::async_trait;
use futures::StreamExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local filesystem store over a single flat directory
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store over an existing directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn not_found_or(name: &str, e: std::io::Error, wrap: fn(String) -> StorageError) -> StorageError {
        if e.kind() == ErrorKind::NotFound {
            StorageError::NotFound(name.to_string())
        } else {
            wrap(format!("{}: {}", name, e))
        }
    }
}

fn is_partial(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|ext| ext == PARTIAL_EXTENSION)
        .unwrap_or(false)
}

#[async_trait]
impl FileStore for LocalStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> StorageResult<PathBuf> {
        guard::resolve(&self.root, name)
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        let mut entries = fs::read_dir(&self.root).await.map_err(|e| {
            StorageError::DownloadFailed(format!(
                "Failed to read directory {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if is_partial(&name) || name.starts_with(".probe-") {
                continue;
            }
            names.push(name);
        }
        names.sort();

        tracing::debug!(path = %self.root.display(), count = names.len(), "Listed directory");
        Ok(names)
    }

    async fn read(&self, name: &str) -> StorageResult<Vec<u8>> {
        let path = self.resolve(name)?;
        let start = std::time::Instant::now();

        let data = fs::read(&path)
            .await
            .map_err(|e| Self::not_found_or(name, e, StorageError::DownloadFailed))?;

        tracing::debug!(
            path = %path.display(),
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local read successful"
        );

        Ok(data)
    }

    async fn read_to_string(&self, name: &str) -> StorageResult<String> {
        let data = self.read(name).await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    async fn open_stream(&self, name: &str) -> StorageResult<(u64, ByteStream)> {
        let path = self.resolve(name)?;

        let file = fs::File::open(&path)
            .await
            .map_err(|e| Self::not_found_or(name, e, StorageError::DownloadFailed))?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }

        let path_display = path.display().to_string();
        let stream = tokio_util::io::ReaderStream::new(file).map(move |result| {
            result.map_err(|e| {
                tracing::error!(path = %path_display, error = %e, "Local stream read error");
                StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        Ok((metadata.len(), Box::pin(stream)))
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        let path = self.resolve(name)?;

        fs::remove_file(&path)
            .await
            .map_err(|e| Self::not_found_or(name, e, StorageError::DeleteFailed))?;

        tracing::info!(path = %path.display(), "Local delete successful");
        Ok(())
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        let path = self.resolve(name)?;
        Ok(fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false))
    }
}
