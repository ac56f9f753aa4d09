//! Storage backend contract
//!
//! This module defines the SPI that all storage backends must implement. The
//! orchestrator never branches on a backend's concrete type: optional
//! capabilities (restoration, availability checks, direct download, periodic
//! actions) have default implementations returning an explicit
//! [`StorageError::Unsupported`] result.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

use stowage_core::models::{FileCacheRequest, FileDeletionRequest, FileReference, FileStorageRequest};
use stowage_core::StorageKind;

use crate::progress::{
    DeletionProgress, PendingActionProgress, RestorationProgress, StorageProgress,
};
use crate::subset::{
    DeletionWorkingSubset, PreparationResponse, RestorationWorkingSubset, StorageWorkingSubset,
};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Store failed: {0}")]
    StoreFailed(String),

    /// Transient download failure: the copy is presumed still cached.
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Restoration failed: {0}")]
    RestorationFailed(String),

    /// The file is not currently retrievable from the backend's fast tier.
    #[error("File not available: {0}")]
    NotAvailable(String),

    #[error("Availability check failed: {0}")]
    AvailabilityCheck(String),

    #[error("Operation not supported by this backend: {0}")]
    Unsupported(&'static str),

    #[error("Invalid storage URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Byte stream returned by a backend's direct-download capability.
pub type DownloadStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Answer to a nearline availability check.
#[derive(Debug, Clone)]
pub struct Availability {
    pub available: bool,
    /// When the fast-tier copy expires, if the backend bounds it.
    pub expiration_date: Option<DateTime<Utc>>,
    pub message: String,
}

impl Availability {
    pub fn available(expiration_date: Option<DateTime<Utc>>, message: impl Into<String>) -> Self {
        Self {
            available: true,
            expiration_date,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            available: false,
            expiration_date: None,
            message: message.into(),
        }
    }
}

/// Storage backend SPI
///
/// Execution methods (`store`, `delete`, `retrieve`) report per-request
/// outcomes exclusively through the supplied progress manager; an `Err`
/// escaping them is a backend bug, and the executor converts it into a
/// failure for every request in the subset.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the storage location this instance was configured for.
    fn name(&self) -> &str;

    /// Access tier this instance was configured with.
    fn kind(&self) -> StorageKind;

    /// Partition a batch of storage requests into working subsets.
    ///
    /// Must not mutate request state; every input request lands in exactly
    /// one subset or one rejection entry.
    fn prepare_for_storage(
        &self,
        requests: Vec<FileStorageRequest>,
    ) -> PreparationResponse<StorageWorkingSubset>;

    fn prepare_for_deletion(
        &self,
        requests: Vec<FileDeletionRequest>,
    ) -> PreparationResponse<DeletionWorkingSubset>;

    fn prepare_for_restoration(
        &self,
        requests: Vec<FileCacheRequest>,
    ) -> PreparationResponse<RestorationWorkingSubset>;

    /// Store every request in the subset, reporting through `progress`.
    async fn store(
        &self,
        subset: StorageWorkingSubset,
        progress: Arc<dyn StorageProgress>,
    ) -> StorageResult<()>;

    /// Delete every request in the subset, reporting through `progress`.
    async fn delete(
        &self,
        subset: DeletionWorkingSubset,
        progress: Arc<dyn DeletionProgress>,
    ) -> StorageResult<()>;

    /// Restore every request in the subset into the internal disk cache
    /// (nearline/offline backends only).
    async fn retrieve(
        &self,
        subset: RestorationWorkingSubset,
        progress: Arc<dyn RestorationProgress>,
    ) -> StorageResult<()> {
        let _ = (subset, progress);
        Err(StorageError::Unsupported("retrieve"))
    }

    /// Query whether the reference is retrievable without a restore
    /// (nearline backends only). Synchronous and potentially slow.
    async fn check_availability(&self, reference: &FileReference) -> StorageResult<Availability> {
        let _ = reference;
        Err(StorageError::Unsupported("check_availability"))
    }

    /// Direct fetch from the backend's own fast tier (nearline optional
    /// capability). Fails with [`StorageError::NotAvailable`] when the fast
    /// tier no longer holds the file, [`StorageError::DownloadFailed`] on
    /// transient errors.
    async fn download(&self, reference: &FileReference) -> StorageResult<DownloadStream> {
        let _ = reference;
        Err(StorageError::Unsupported("download"))
    }

    /// Check on previously-reported pending actions and promote them to
    /// fully-succeeded or to error. Invoked on a schedule by the worker.
    async fn run_periodic_action(
        &self,
        progress: Arc<dyn PendingActionProgress>,
    ) -> StorageResult<()> {
        let _ = progress;
        Ok(())
    }

    /// Check that `url` denotes a file stored by this backend instance.
    /// Appends human-readable problems to `errors`. No side effects.
    fn validate_url(&self, url: &str, errors: &mut Vec<String>) -> bool;

    /// Whether this backend physically removes bytes on delete.
    fn allows_physical_deletion(&self) -> bool;
}
