//! Defaults shared across crates.

/// Multipart field name accepted by the upload endpoint.
pub const UPLOAD_FIELD_NAME: &str = "file";

/// Suffix inserted between the job id and the artifact extension.
pub const OUTPUT_SUFFIX: &str = "-output";

/// Extension used for in-progress uploads before they are renamed into place.
pub const PARTIAL_EXTENSION: &str = "part";

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_OUTPUT_DIR: &str = "outputs";
pub const DEFAULT_MAX_UPLOAD_SIZE_MB: u64 = 50;
pub const DEFAULT_ANALYSIS_PROGRAM: &str = "python3";
pub const DEFAULT_ANALYSIS_ARGS: &str = "python_scripts/process_xrd.py";
pub const DEFAULT_ANALYSIS_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_IMAGE_EXTENSION: &str = "jpg";
pub const DEFAULT_DOCUMENT_EXTENSION: &str = "pdf";
pub const DEFAULT_CAPTURE_MAX_LINES: usize = 200;
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;

/// Longest filename accepted from a client.
pub const MAX_FILENAME_LENGTH: usize = 255;
