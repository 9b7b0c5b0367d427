use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A file accepted by the ingestion service and persisted in the uploads directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadedFile {
    /// `<unix-millis>-<random>`; unique across concurrent uploads.
    pub id: String,
    /// Client-supplied name. Untrusted, only used to derive the extension.
    pub original_name: String,
    /// Name on disk, `<field>-<id><ext>`.
    pub stored_name: String,
    #[serde(skip)]
    pub stored_path: PathBuf,
    pub size_bytes: u64,
    pub mime_type: String,
    pub received_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(stored_name: &str) -> UploadedFile {
        UploadedFile {
            id: "1700000000000-42".to_string(),
            original_name: "scan.csv".to_string(),
            stored_name: stored_name.to_string(),
            stored_path: PathBuf::from("/srv/uploads").join(stored_name),
            size_bytes: 12,
            mime_type: "text/csv".to_string(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_stored_path_not_serialized() {
        let json = serde_json::to_value(sample("file-1-2.csv")).unwrap();
        assert!(json.get("stored_path").is_none());
        assert_eq!(json["stored_name"], "file-1-2.csv");
        assert_eq!(json["size_bytes"], 12);
    }
}
