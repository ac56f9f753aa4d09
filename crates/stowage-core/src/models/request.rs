//! Pending work units: storage, deletion, and restoration requests.
//!
//! Each request targets one checksum on one backend and carries enough
//! metadata to be retried or reported as failed independently of its
//! siblings. Requests are created by the request-intake layer, consumed by a
//! working subset, and terminated by a progress-report callback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to store the file behind `origin_url` on a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStorageRequest {
    pub id: Uuid,
    pub checksum: String,
    pub algorithm: String,
    pub filename: String,
    pub mime_type: String,
    /// URL the backend reads the file bytes from.
    pub origin_url: String,
    /// Target storage location name. `None` until an allocation strategy
    /// assigns one.
    pub storage: Option<String>,
    /// Optional backend subdirectory to store under.
    pub subdirectory: Option<String>,
    /// Cause of the last execution failure, if any.
    pub error_cause: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FileStorageRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        checksum: impl Into<String>,
        algorithm: impl Into<String>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        origin_url: impl Into<String>,
        storage: Option<String>,
        subdirectory: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            checksum: checksum.into(),
            algorithm: algorithm.into(),
            filename: filename.into(),
            mime_type: mime_type.into(),
            origin_url: origin_url.into(),
            storage,
            subdirectory,
            error_cause: None,
            created_at: Utc::now(),
        }
    }
}

/// Request to delete a stored copy from a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDeletionRequest {
    pub id: Uuid,
    pub checksum: String,
    /// Storage location name holding the copy to delete.
    pub storage: String,
    /// Backend-specific URL of the stored copy.
    pub file_url: String,
    pub error_cause: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FileDeletionRequest {
    pub fn new(
        checksum: impl Into<String>,
        storage: impl Into<String>,
        file_url: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            checksum: checksum.into(),
            storage: storage.into(),
            file_url: file_url.into(),
            error_cause: None,
            created_at: Utc::now(),
        }
    }
}

/// Request to restore a nearline copy into the internal disk cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCacheRequest {
    pub id: Uuid,
    pub checksum: String,
    /// Nearline storage location name holding the copy.
    pub storage: String,
    /// Backend-specific URL of the stored copy.
    pub file_url: String,
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
    /// Directory of the internal disk cache the file is restored into.
    pub destination_path: String,
    pub error_cause: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FileCacheRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        checksum: impl Into<String>,
        storage: impl Into<String>,
        file_url: impl Into<String>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        file_size: i64,
        destination_path: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            checksum: checksum.into(),
            storage: storage.into(),
            file_url: file_url.into(),
            filename: filename.into(),
            mime_type: mime_type.into(),
            file_size,
            destination_path: destination_path.into(),
            error_cause: None,
            created_at: Utc::now(),
        }
    }
}
