//! Progress reporting protocol
//!
//! The only channel by which a backend communicates per-request outcomes back
//! to persisted state. Backends call these from within (possibly
//! asynchronous) subset execution; the orchestrator guarantees that every
//! request in a dispatched working subset receives exactly one terminal
//! callback, treating a missing callback as an implicit failure.
//!
//! Callbacks are infallible from the backend's point of view: recording
//! errors are the orchestrator's to log and absorb.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;

use stowage_core::models::{FileCacheRequest, FileDeletionRequest, FileStorageRequest};

/// Outcome reporting for `store` execution.
#[async_trait]
pub trait StorageProgress: Send + Sync {
    /// Terminal success: the file is stored at `stored_url`.
    async fn storage_succeeded(
        &self,
        request: &FileStorageRequest,
        stored_url: &str,
        file_size: i64,
    );

    /// The file is stored and usable now, but a backend follow-up action is
    /// still running; the file reference stays flagged until the periodic
    /// action reports the outcome.
    async fn storage_succeeded_with_pending_action(
        &self,
        request: &FileStorageRequest,
        stored_url: &str,
        file_size: i64,
        notify_administrators: bool,
    );

    /// Terminal failure; the request is retained with the recorded cause.
    async fn storage_failed(&self, request: &FileStorageRequest, cause: &str);
}

/// Outcome reporting for `delete` execution.
#[async_trait]
pub trait DeletionProgress: Send + Sync {
    async fn deletion_succeeded(&self, request: &FileDeletionRequest);

    async fn deletion_failed(&self, request: &FileDeletionRequest, cause: &str);
}

/// Outcome reporting for `retrieve` (restoration) execution.
#[async_trait]
pub trait RestorationProgress: Send + Sync {
    /// Terminal success: the file was restored to `restored_path`, valid
    /// until `expiration_date`. Creates an internal cache ledger entry.
    async fn restoration_succeeded(
        &self,
        request: &FileCacheRequest,
        restored_path: &Path,
        file_size: i64,
        expiration_date: DateTime<Utc>,
    );

    async fn restoration_failed(&self, request: &FileCacheRequest, cause: &str);
}

/// Outcome reporting for pending actions checked by `run_periodic_action`.
#[async_trait]
pub trait PendingActionProgress: Send + Sync {
    /// The follow-up action for the stored copy completed; the pending flag
    /// on the file reference is cleared.
    async fn pending_action_succeeded(&self, storage: &str, checksum: &str);

    /// The follow-up action ultimately failed; surfaced via notification,
    /// not re-queued automatically.
    async fn pending_action_failed(&self, storage: &str, checksum: &str, cause: &str);
}
