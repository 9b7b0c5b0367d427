//! Assay Storage Library
//!
//! Filesystem side of the pipeline: the uploads and outputs directories, the
//! path safety guard every client-supplied filename goes through, streamed
//! ingestion of uploads and the list/read/delete stores over both
//! directories.
//!
//! # Naming
//!
//! Stored uploads are named `<field>-<unix-millis>-<random><ext>`. The stem of
//! that name is the job id; a job writes `<job_id>-output.<ext>` into the
//! outputs directory. Name generation lives in the `naming` module so the
//! ingestion service and the processing crate agree on it.

pub mod factory;
pub mod guard;
pub mod ingest;
pub mod local;
pub mod naming;
pub mod paths;
pub mod traits;

// Re-export commonly used types
pub use factory::{create_stores, Stores};
pub use guard::{resolve, validate_name};
pub use ingest::IngestionService;
pub use local::LocalStore;
pub use paths::StoragePaths;
pub use traits::{ByteStream, FileStore, StorageError, StorageResult};
