//! Streamed ingestion of uploads.
//!
//! Bytes are written to `<stored_name>.part`, fsynced and renamed into place,
//! so a stored name in the uploads directory always refers to a complete
//! file. Any failure removes the partial file.

use crate::naming;
use crate::paths::StoragePaths;
use crate::traits::{StorageError, StorageResult};
use assay_core::constants::PARTIAL_EXTENSION;
use assay_core::UploadedFile;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Attempts at finding an unused stored name before giving up.
const NAME_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct IngestionService {
    paths: StoragePaths,
    max_bytes: u64,
}

impl IngestionService {
    pub fn new(paths: StoragePaths, max_bytes: u64) -> Self {
        Self { paths, max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Persist one uploaded file.
    ///
    /// `declared_size` is checked before reading; the running total is checked
    /// after every chunk, so an oversized body is cut off as soon as it crosses
    /// the ceiling.
    pub async fn ingest<S>(
        &self,
        field_name: &str,
        original_name: &str,
        mime_type: &str,
        declared_size: Option<u64>,
        stream: S,
    ) -> StorageResult<UploadedFile>
    where
        S: Stream<Item = Result<Bytes, StorageError>>,
    {
        if let Some(size) = declared_size {
            if size > self.max_bytes {
                return Err(StorageError::TooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        self.paths.ensure_uploads().await?;
        let start = std::time::Instant::now();

        let (id, stored_name, final_path, part_path, file) =
            self.reserve(field_name, original_name).await?;

        let stream = std::pin::pin!(stream);
        let size_bytes = match self.write_part(file, stream).await {
            Ok(size) => size,
            Err(e) => {
                discard(&part_path).await;
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&part_path, &final_path).await {
            discard(&part_path).await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to move upload into place {}: {}",
                final_path.display(),
                e
            )));
        }

        tracing::info!(
            path = %final_path.display(),
            stored_name = %stored_name,
            size_bytes = size_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload stored"
        );

        Ok(UploadedFile {
            id,
            original_name: original_name.to_string(),
            stored_name,
            stored_path: final_path,
            size_bytes,
            mime_type: mime_type.to_string(),
            received_at: chrono::Utc::now(),
        })
    }

    /// Pick an unused stored name and create its partial file exclusively.
    async fn reserve(
        &self,
        field_name: &str,
        original_name: &str,
    ) -> StorageResult<(String, String, PathBuf, PathBuf, fs::File)> {
        for _ in 0..NAME_ATTEMPTS {
            let id = naming::generate_id();
            let stored_name = naming::stored_name(field_name, &id, original_name);
            let final_path = self.paths.uploads().join(&stored_name);
            let part_path = self
                .paths
                .uploads()
                .join(format!("{}.{}", stored_name, PARTIAL_EXTENSION));

            if fs::try_exists(&final_path).await.unwrap_or(false) {
                continue;
            }

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&part_path)
                .await
            {
                Ok(file) => return Ok((id, stored_name, final_path, part_path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(StorageError::UploadFailed(format!(
                        "Failed to create file {}: {}",
                        part_path.display(),
                        e
                    )))
                }
            }
        }

        Err(StorageError::UploadFailed(
            "Could not allocate a unique stored name".to_string(),
        ))
    }

    async fn write_part<S>(&self, mut file: fs::File, mut stream: S) -> StorageResult<u64>
    where
        S: Stream<Item = Result<Bytes, StorageError>> + Unpin,
    {
        let mut total: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            total += chunk.len() as u64;
            if total > self.max_bytes {
                tracing::debug!(
                    limit = self.max_bytes,
                    received = total,
                    "Upload exceeded size limit"
                );
                return Err(StorageError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| StorageError::UploadFailed(format!("Failed to write upload: {}", e)))?;
        }

        if total == 0 {
            return Err(StorageError::EmptyUpload);
        }

        file.flush().await?;
        file.sync_all()
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Failed to sync upload: {}", e)))?;

        Ok(total)
    }
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial upload");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tempfile::{tempdir, TempDir};

    async fn service(max_bytes: u64) -> (TempDir, IngestionService) {
        let root = tempdir().unwrap();
        let paths = StoragePaths::init(root.path().join("uploads"), root.path().join("outputs"))
            .await
            .unwrap();
        (root, IngestionService::new(paths, max_bytes))
    }

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes, StorageError>> {
        let items: Vec<Result<Bytes, StorageError>> = parts
            .iter()
            .map(|p| Ok(Bytes::from_static(p.as_bytes())))
            .collect();
        stream::iter(items)
    }

    fn upload_dir_entries(root: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(root.path().join("uploads"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_ingest_persists_file() {
        let (root, service) = service(1024).await;

        let uploaded = service
            .ingest(
                "file",
                "scan.csv",
                "text/csv",
                None,
                chunks(&["2theta,", "intensity\n"]),
            )
            .await
            .unwrap();

        assert_eq!(uploaded.size_bytes, 17);
        assert_eq!(uploaded.original_name, "scan.csv");
        assert!(uploaded.stored_name.starts_with("file-"));
        assert!(uploaded.stored_name.ends_with(".csv"));
        assert_eq!(
            std::fs::read(&uploaded.stored_path).unwrap(),
            b"2theta,intensity\n"
        );
        assert_eq!(upload_dir_entries(&root), vec![uploaded.stored_name.clone()]);
    }

    #[tokio::test]
    async fn test_same_original_name_gets_unique_stored_names() {
        let (_root, service) = service(1024).await;

        let a = service
            .ingest("file", "same.csv", "text/csv", None, chunks(&["a"]))
            .await
            .unwrap();
        let b = service
            .ingest("file", "same.csv", "text/csv", None, chunks(&["b"]))
            .await
            .unwrap();

        assert_ne!(a.stored_name, b.stored_name);
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_declared_size_over_limit_rejected_before_reading() {
        let (root, service) = service(4).await;

        let result = service
            .ingest("file", "a.csv", "text/csv", Some(5), chunks(&["x"]))
            .await;

        assert!(matches!(result, Err(StorageError::TooLarge { limit: 4 })));
        assert!(upload_dir_entries(&root).is_empty());
    }

    #[tokio::test]
    async fn test_streamed_size_over_limit_leaves_nothing_behind() {
        let (root, service) = service(4).await;

        let result = service
            .ingest("file", "a.csv", "text/csv", None, chunks(&["abc", "de"]))
            .await;

        assert!(matches!(result, Err(StorageError::TooLarge { .. })));
        assert!(upload_dir_entries(&root).is_empty());
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let (root, service) = service(1024).await;

        let result = service
            .ingest("file", "a.csv", "text/csv", None, chunks(&[]))
            .await;

        assert!(matches!(result, Err(StorageError::EmptyUpload)));
        assert!(upload_dir_entries(&root).is_empty());
    }

    #[tokio::test]
    async fn test_stream_error_removes_partial() {
        let (root, service) = service(1024).await;
        let failing = stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Err(StorageError::UploadFailed("client went away".to_string())),
        ]);

        let result = service
            .ingest("file", "a.csv", "text/csv", None, failing)
            .await;

        assert!(matches!(result, Err(StorageError::UploadFailed(_))));
        assert!(upload_dir_entries(&root).is_empty());
    }

    #[tokio::test]
    async fn test_ingest_recreates_missing_upload_dir() {
        let (root, service) = service(1024).await;
        std::fs::remove_dir_all(root.path().join("uploads")).unwrap();

        let uploaded = service
            .ingest("file", "a.csv", "text/csv", None, chunks(&["1"]))
            .await
            .unwrap();

        assert!(uploaded.stored_path.exists());
    }
}
