//! Assay Core Library
//!
//! This crate provides the domain models, error types and configuration
//! shared by the storage, processing and API crates.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{BaseConfig, Config, PipelineConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    ArtifactKind, JobFailure, JobStatus, OutputArtifact, ProcessingJob, TransitionError,
    UploadedFile,
};
