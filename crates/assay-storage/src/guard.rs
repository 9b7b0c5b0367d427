//! Path safety guard
//!
//! Client-supplied filenames are only ever joined onto a base directory after
//! passing through [`resolve`]. The result is guaranteed to be a direct child
//! of the base, and if it already exists its canonical form must still be
//! inside the canonical base (no symlink escapes).

use crate::traits::{StorageError, StorageResult};
use assay_core::constants::MAX_FILENAME_LENGTH;
use std::path::{Component, Path, PathBuf};

/// Reject names that could address anything other than a single file in the base directory.
pub fn validate_name(name: &str) -> StorageResult<()> {
    if name.is_empty() {
        return Err(StorageError::InvalidKey("File name is empty".to_string()));
    }
    if name.len() > MAX_FILENAME_LENGTH {
        return Err(StorageError::InvalidKey(format!(
            "File name exceeds {} bytes",
            MAX_FILENAME_LENGTH
        )));
    }
    if name == "." || name.contains("..") {
        return Err(StorageError::InvalidKey(
            "File name contains a parent directory reference".to_string(),
        ));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(StorageError::InvalidKey(
            "File name contains a path separator".to_string(),
        ));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(StorageError::InvalidKey(
            "File name contains control characters".to_string(),
        ));
    }
    Ok(())
}

/// Resolve `name` to a path directly inside `base`.
pub fn resolve(base: &Path, name: &str) -> StorageResult<PathBuf> {
    validate_name(name)?;

    let candidate = base.join(name);

    let single_component = candidate
        .strip_prefix(base)
        .map(|rest| {
            let mut components = rest.components();
            matches!(
                (components.next(), components.next()),
                (Some(Component::Normal(_)), None)
            )
        })
        .unwrap_or(false);
    if !single_component {
        return Err(StorageError::InvalidKey(
            "File name resolves outside storage directory".to_string(),
        ));
    }

    if let Ok(canonical) = candidate.canonicalize() {
        let base_canonical = base.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;
        if canonical == base_canonical || !canonical.starts_with(&base_canonical) {
            tracing::warn!(
                name = %name,
                resolved = %canonical.display(),
                "Rejected file name resolving outside storage directory"
            );
            return Err(StorageError::InvalidKey(
                "File name resolves outside storage directory".to_string(),
            ));
        }
    }

    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_plain_name_resolves_inside_base() {
        let dir = tempdir().unwrap();
        let path = resolve(dir.path(), "file-1-2.csv").unwrap();
        assert_eq!(path, dir.path().join("file-1-2.csv"));
    }

    #[test]
    fn test_traversal_rejected() {
        let dir = tempdir().unwrap();
        for name in [
            "..",
            ".",
            "../etc/passwd",
            "..\\windows",
            "a/../../b",
            "/etc/passwd",
            "sub/file.csv",
            "file..csv",
            "bad\0name",
            "line\nbreak",
            "",
        ] {
            let result = resolve(dir.path(), name);
            assert!(
                matches!(result, Err(StorageError::InvalidKey(_))),
                "expected {:?} to be rejected",
                name
            );
        }
    }

    #[test]
    fn test_overlong_name_rejected() {
        let dir = tempdir().unwrap();
        let name = "a".repeat(MAX_FILENAME_LENGTH + 1);
        assert!(matches!(
            resolve(dir.path(), &name),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let base = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let secret = outside.path().join("secret.txt");
        std::fs::write(&secret, b"secret").unwrap();
        std::os::unix::fs::symlink(&secret, base.path().join("link.txt")).unwrap();

        assert!(matches!(
            resolve(base.path(), "link.txt"),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_missing_file_still_resolves() {
        let dir = tempdir().unwrap();
        assert!(resolve(dir.path(), "not-yet-written.pdf").is_ok());
    }
}
