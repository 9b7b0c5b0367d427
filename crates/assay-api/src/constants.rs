//! HTTP-layer constants

/// Name reported by `GET /` and the health endpoints
pub const SERVICE_NAME: &str = "assay";

/// Room for multipart boundaries and part headers on top of the upload ceiling.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Timeout for each readiness probe
pub const READINESS_CHECK_TIMEOUT_SECS: u64 = 5;

/// Server-wide cap on in-flight HTTP requests
pub const HTTP_CONCURRENCY_LIMIT: usize = 1024;
