//! `file://` URL helpers shared by the filesystem-backed backends.

use std::path::{Path, PathBuf};

use crate::traits::{StorageError, StorageResult};

/// Render an absolute filesystem path as a `file://` URL.
pub fn path_to_file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// Parse a `file://` URL back into a filesystem path.
pub fn file_url_to_path(url: &str) -> StorageResult<PathBuf> {
    let path = url
        .strip_prefix("file://")
        .ok_or_else(|| StorageError::InvalidUrl(format!("not a file URL: {}", url)))?;
    if path.is_empty() {
        return Err(StorageError::InvalidUrl(format!("empty file URL: {}", url)));
    }
    Ok(PathBuf::from(path))
}

/// Reject keys that could escape a backend's root directory.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.contains("..") || key.starts_with('/') {
        return Err(StorageError::InvalidUrl(format!(
            "storage key contains invalid characters: {}",
            key
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_url_roundtrip() {
        let path = PathBuf::from("/var/lib/stowage/archive/abc");
        let url = path_to_file_url(&path);
        assert_eq!(url, "file:///var/lib/stowage/archive/abc");
        assert_eq!(file_url_to_path(&url).unwrap(), path);
    }

    #[test]
    fn rejects_foreign_scheme() {
        assert!(matches!(
            file_url_to_path("http://example.com/abc"),
            Err(StorageError::InvalidUrl(_))
        ));
    }

    #[test]
    fn rejects_traversal_keys() {
        assert!(validate_key("sub/../../etc/passwd").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("sub/abc").is_ok());
    }
}
