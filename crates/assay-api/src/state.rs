use assay_core::Config;
use assay_processing::{OrchestratorConfig, ProcessingOrchestrator, UploadValidator};
use assay_storage::{FileStore, IngestionService, StoragePaths, Stores};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state handed to every handler
pub struct AppState {
    pub config: Config,
    pub paths: StoragePaths,
    pub uploads: Arc<dyn FileStore>,
    pub outputs: Arc<dyn FileStore>,
    pub ingestion: IngestionService,
    pub validator: UploadValidator,
    pub orchestrator: ProcessingOrchestrator,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config, stores: Stores) -> Self {
        let orchestrator = ProcessingOrchestrator::new(
            OrchestratorConfig::from_config(&config),
            stores.paths.clone(),
        );
        let validator = UploadValidator::new(config.max_upload_size_bytes());

        Self {
            config,
            paths: stores.paths,
            uploads: stores.uploads,
            outputs: stores.outputs,
            ingestion: stores.ingestion,
            validator,
            orchestrator,
            started_at: Instant::now(),
        }
    }
}
