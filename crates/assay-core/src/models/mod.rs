//! Data models for the pipeline
//!
//! Models live for the duration of a request chain. The filesystem is the
//! durable record; nothing here is persisted.

mod job;
mod upload;

pub use job::*;
pub use upload::*;
