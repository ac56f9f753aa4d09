//! File reference model: a stored file's identity and current placement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a file currently lives: a storage location name plus the
/// backend-specific URL of the stored copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLocation {
    /// Name of the `StorageLocationConfiguration` holding the copy.
    pub storage: String,
    /// Backend-specific URL of the stored copy.
    pub url: String,
    /// True while a backend-reported follow-up action is still running for
    /// this copy. The file is readable; the flag is cleared or escalated by
    /// the backend's periodic action.
    pub pending_action_remaining: bool,
}

impl FileLocation {
    pub fn new(storage: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            storage: storage.into(),
            url: url.into(),
            pending_action_remaining: false,
        }
    }
}

/// A stored file: content identity (checksum) plus current placement.
///
/// Created when a store request completes; destroyed when a deletion request
/// completes. `nearline_confirmed` is mutated only by availability checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReference {
    /// Content hash, the immutable identity of the file.
    pub checksum: String,
    /// Hash algorithm that produced `checksum` (e.g. "sha256").
    pub algorithm: String,
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
    pub location: FileLocation,
    /// True once a nearline backend explicitly reported the file as *not*
    /// currently available. Positive answers never set this.
    pub nearline_confirmed: bool,
    pub stored_at: DateTime<Utc>,
}

impl FileReference {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        checksum: impl Into<String>,
        algorithm: impl Into<String>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        file_size: i64,
        location: FileLocation,
    ) -> Self {
        Self {
            checksum: checksum.into(),
            algorithm: algorithm.into(),
            filename: filename.into(),
            mime_type: mime_type.into(),
            file_size,
            location,
            nearline_confirmed: false,
            stored_at: Utc::now(),
        }
    }
}
