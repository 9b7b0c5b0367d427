use std::path::Path;

/// Validation errors for incoming uploads
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("No file uploaded")]
    MissingFile,

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Empty file")]
    EmptyFile,
}

/// Upload validator
///
/// Checks what can be checked before the body is read. The byte ceiling is
/// enforced again while streaming by the ingestion service.
pub struct UploadValidator {
    max_file_size: u64,
}

impl UploadValidator {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    /// Validate a size announced by the client, if any
    pub fn validate_declared_size(&self, size: Option<u64>) -> Result<(), ValidationError> {
        match size {
            Some(0) => Err(ValidationError::EmptyFile),
            Some(size) if size > self.max_file_size => Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            }),
            _ => Ok(()),
        }
    }

    /// Reduce a client filename to its last path component.
    ///
    /// Browsers on some platforms send full paths. Only the base name is kept;
    /// it is used for the stored extension and nothing else.
    pub fn normalize_original_name(&self, name: Option<&str>) -> Result<String, ValidationError> {
        let name = name.map(str::trim).unwrap_or_default();
        let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

        if base.is_empty() || base == "." || base == ".." {
            return Err(ValidationError::InvalidFilename(name.to_string()));
        }
        if base.chars().any(|c| c.is_control()) {
            return Err(ValidationError::InvalidFilename(
                "filename contains control characters".to_string(),
            ));
        }

        Ok(Path::new(base)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(base)
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_size() {
        let validator = UploadValidator::new(10);
        assert!(validator.validate_declared_size(None).is_ok());
        assert!(validator.validate_declared_size(Some(10)).is_ok());
        assert!(matches!(
            validator.validate_declared_size(Some(11)),
            Err(ValidationError::FileTooLarge { size: 11, max: 10 })
        ));
        assert!(matches!(
            validator.validate_declared_size(Some(0)),
            Err(ValidationError::EmptyFile)
        ));
    }

    #[test]
    fn test_normalize_original_name() {
        let validator = UploadValidator::new(10);
        assert_eq!(
            validator.normalize_original_name(Some("scan.csv")).unwrap(),
            "scan.csv"
        );
        assert_eq!(
            validator
                .normalize_original_name(Some("C:\\Users\\lab\\scan.csv"))
                .unwrap(),
            "scan.csv"
        );
        assert_eq!(
            validator
                .normalize_original_name(Some("../../etc/passwd"))
                .unwrap(),
            "passwd"
        );
        assert!(validator.normalize_original_name(None).is_err());
        assert!(validator.normalize_original_name(Some("dir/")).is_err());
        assert!(validator.normalize_original_name(Some("..")).is_err());
    }
}
