//! Repository traits consumed by the orchestration services.
//!
//! All mutations are single-row writes keyed by checksum (plus storage name
//! where a checksum can be stored in several places); a batch never spans a
//! multi-row transaction, so one backend error cannot roll back unrelated
//! successful entries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use stowage_core::models::{CacheFile, FileReference, StorageLocationConfiguration};
use stowage_core::{AppError, StorageKind};

/// Persistence for [`FileReference`] rows, keyed by (storage, checksum).
#[async_trait]
pub trait FileReferenceRepository: Send + Sync {
    /// Insert or update the reference for its (storage, checksum) key.
    async fn save(&self, reference: FileReference) -> Result<FileReference, AppError>;

    /// All references whose checksum is in `checksums`, across storages.
    async fn find_by_checksums(&self, checksums: &[String]) -> Result<Vec<FileReference>, AppError>;

    async fn find_by_storage_and_checksum(
        &self,
        storage: &str,
        checksum: &str,
    ) -> Result<Option<FileReference>, AppError>;

    /// Atomically record that the nearline backend reported the file
    /// not-available. Single-row write.
    async fn confirm_nearline_unavailable(
        &self,
        storage: &str,
        checksum: &str,
    ) -> Result<(), AppError>;

    /// Set or clear the pending-action flag on the stored copy.
    async fn set_pending_action_remaining(
        &self,
        storage: &str,
        checksum: &str,
        pending: bool,
    ) -> Result<(), AppError>;

    async fn delete(&self, storage: &str, checksum: &str) -> Result<(), AppError>;
}

/// Persistence for the cache ledger, keyed by checksum.
#[async_trait]
pub trait CacheFileRepository: Send + Sync {
    async fn upsert(&self, cache_file: CacheFile) -> Result<(), AppError>;

    async fn find_by_checksum(&self, checksum: &str) -> Result<Option<CacheFile>, AppError>;

    async fn find_by_checksums(&self, checksums: &[String]) -> Result<Vec<CacheFile>, AppError>;

    async fn delete_by_checksum(&self, checksum: &str) -> Result<(), AppError>;

    /// Entries whose expiration date is at or before `now`.
    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<CacheFile>, AppError>;
}

/// Persistence for storage location configurations, keyed by name.
#[async_trait]
pub trait StorageLocationConfigurationRepository: Send + Sync {
    async fn save(
        &self,
        configuration: StorageLocationConfiguration,
    ) -> Result<StorageLocationConfiguration, AppError>;

    async fn find_by_name(
        &self,
        name: &str,
    ) -> Result<Option<StorageLocationConfiguration>, AppError>;

    async fn find_all(&self) -> Result<Vec<StorageLocationConfiguration>, AppError>;

    async fn find_by_kind(
        &self,
        kind: StorageKind,
    ) -> Result<Vec<StorageLocationConfiguration>, AppError>;
}

/// Persistence for one kind of pending request queue.
///
/// Successful requests are deleted; failed requests are retained with their
/// recorded cause and stay eligible for re-submission by external policy.
#[async_trait]
pub trait RequestRepository<R>: Send + Sync {
    async fn save(&self, request: R) -> Result<R, AppError>;

    async fn find_pending(&self, limit: i64) -> Result<Vec<R>, AppError>;

    async fn delete(&self, id: Uuid) -> Result<(), AppError>;

    async fn mark_error(&self, id: Uuid, cause: &str) -> Result<(), AppError>;
}
