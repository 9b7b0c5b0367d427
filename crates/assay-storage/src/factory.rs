use crate::{FileStore, IngestionService, LocalStore, StoragePaths, StorageResult};
use assay_core::Config;
use std::sync::Arc;

/// Everything the pipeline needs from the filesystem.
#[derive(Clone)]
pub struct Stores {
    pub paths: StoragePaths,
    pub uploads: Arc<dyn FileStore>,
    pub outputs: Arc<dyn FileStore>,
    pub ingestion: IngestionService,
}

/// Create both directories and the stores over them based on configuration
pub async fn create_stores(config: &Config) -> StorageResult<Stores> {
    let paths = StoragePaths::init(config.upload_dir(), config.output_dir()).await?;

    Ok(Stores {
        uploads: Arc::new(LocalStore::new(paths.uploads())),
        outputs: Arc::new(LocalStore::new(paths.outputs())),
        ingestion: IngestionService::new(paths.clone(), config.max_upload_size_bytes()),
        paths,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assay_core::PipelineConfig;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_stores_from_config() {
        let root = tempdir().unwrap();
        let config = Config::new(PipelineConfig {
            upload_dir: root.path().join("uploads"),
            output_dir: root.path().join("outputs"),
            ..PipelineConfig::default()
        });

        let stores = create_stores(&config).await.unwrap();
        assert!(stores.uploads.list().await.unwrap().is_empty());
        assert!(stores.outputs.list().await.unwrap().is_empty());
        assert_eq!(stores.outputs.root(), stores.paths.outputs());
        assert_eq!(
            stores.ingestion.max_bytes(),
            config.max_upload_size_bytes()
        );
    }
}
