//! Storage abstraction trait
//!
//! `FileStore` is the list/read/delete surface over one flat directory. Both
//! the uploads and the outputs directory are exposed through it.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid file name: {0}")]
    InvalidKey(String),

    #[error("File exceeds the maximum upload size of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Uploaded file is empty")]
    EmptyUpload,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked file body, as handed to the HTTP layer for downloads.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// A flat directory of files addressed by client-visible names.
///
/// Every method that takes a name runs it through the path safety guard
/// before touching the filesystem.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Directory this store serves.
    fn root(&self) -> &Path;

    /// Resolve a client-supplied name to a path inside the root.
    fn resolve(&self, name: &str) -> StorageResult<PathBuf>;

    /// Sorted names of the regular files in the root, excluding in-progress
    /// uploads. Empty when the directory is empty.
    async fn list(&self) -> StorageResult<Vec<String>>;

    /// Whole file contents
    async fn read(&self, name: &str) -> StorageResult<Vec<u8>>;

    /// Whole file contents as UTF-8 (lossy)
    async fn read_to_string(&self, name: &str) -> StorageResult<String>;

    /// Open a file for streamed download. Returns the size and the body stream.
    async fn open_stream(&self, name: &str) -> StorageResult<(u64, ByteStream)>;

    /// Remove a file. Missing files yield `NotFound`.
    async fn delete(&self, name: &str) -> StorageResult<()>;

    /// Check if a file exists
    async fn exists(&self, name: &str) -> StorageResult<bool>;
}
