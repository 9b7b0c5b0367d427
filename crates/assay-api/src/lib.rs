//! Assay API Library
//!
//! This crate provides the HTTP handlers, middleware and application setup
//! for the upload, process and artifact endpoints.

pub mod constants;
pub mod error;
mod handlers;
pub mod middleware;
pub mod setup;
pub mod state;
pub mod telemetry;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
