//! Progress recorder: applies backend-reported outcomes to persisted state.
//!
//! Implements all four progress protocols against the repositories. Success
//! creates/deletes file references and removes the pending request; failure
//! records the cause on the retained request. Every terminal outcome is
//! published to the outbound event channel.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;

use stowage_core::models::{
    CacheFile, FileCacheRequest, FileDeletionRequest, FileLocation, FileReference,
    FileStorageRequest,
};
use stowage_db::{CacheFileRepository, FileReferenceRepository, RequestRepository};
use stowage_storage::progress::{
    DeletionProgress, PendingActionProgress, RestorationProgress, StorageProgress,
};

use crate::events::{EventPublisher, StorageEvent};

/// Repository-backed implementation of the progress protocols.
pub struct ProgressRecorder {
    file_references: Arc<dyn FileReferenceRepository>,
    cache_files: Arc<dyn CacheFileRepository>,
    storage_requests: Arc<dyn RequestRepository<FileStorageRequest>>,
    deletion_requests: Arc<dyn RequestRepository<FileDeletionRequest>>,
    cache_requests: Arc<dyn RequestRepository<FileCacheRequest>>,
    events: Arc<dyn EventPublisher>,
}

impl ProgressRecorder {
    pub fn new(
        file_references: Arc<dyn FileReferenceRepository>,
        cache_files: Arc<dyn CacheFileRepository>,
        storage_requests: Arc<dyn RequestRepository<FileStorageRequest>>,
        deletion_requests: Arc<dyn RequestRepository<FileDeletionRequest>>,
        cache_requests: Arc<dyn RequestRepository<FileCacheRequest>>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            file_references,
            cache_files,
            storage_requests,
            deletion_requests,
            cache_requests,
            events,
        }
    }

    async fn record_stored(
        &self,
        request: &FileStorageRequest,
        stored_url: &str,
        file_size: i64,
        pending_action: bool,
        notify_administrators: bool,
    ) {
        let storage = request.storage.clone().unwrap_or_default();
        let mut location = FileLocation::new(storage.clone(), stored_url);
        location.pending_action_remaining = pending_action;

        let reference = FileReference::new(
            &request.checksum,
            &request.algorithm,
            &request.filename,
            &request.mime_type,
            file_size,
            location,
        );

        match self.file_references.save(reference).await {
            Ok(_) => {
                if let Err(e) = self.storage_requests.delete(request.id).await {
                    tracing::error!(
                        error = %e,
                        request_id = %request.id,
                        "Failed to remove completed storage request"
                    );
                }
                tracing::info!(
                    checksum = %request.checksum,
                    storage = %storage,
                    stored_url = %stored_url,
                    pending_action,
                    "Storage request succeeded"
                );
                self.events
                    .publish(StorageEvent::StoreSucceeded {
                        checksum: request.checksum.clone(),
                        storage,
                        stored_url: stored_url.to_string(),
                        pending_action,
                        notify_administrators,
                    })
                    .await;
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    checksum = %request.checksum,
                    "Failed to record stored file reference"
                );
                let cause = format!(
                    "stored at {} but failed to record file reference: {}",
                    stored_url, e
                );
                if let Err(e) = self.storage_requests.mark_error(request.id, &cause).await {
                    tracing::error!(error = %e, request_id = %request.id, "Failed to record request error");
                }
            }
        }
    }
}

#[async_trait]
impl StorageProgress for ProgressRecorder {
    async fn storage_succeeded(
        &self,
        request: &FileStorageRequest,
        stored_url: &str,
        file_size: i64,
    ) {
        self.record_stored(request, stored_url, file_size, false, false)
            .await;
    }

    async fn storage_succeeded_with_pending_action(
        &self,
        request: &FileStorageRequest,
        stored_url: &str,
        file_size: i64,
        notify_administrators: bool,
    ) {
        self.record_stored(request, stored_url, file_size, true, notify_administrators)
            .await;
    }

    async fn storage_failed(&self, request: &FileStorageRequest, cause: &str) {
        tracing::warn!(
            checksum = %request.checksum,
            cause = %cause,
            "Storage request failed"
        );
        if let Err(e) = self.storage_requests.mark_error(request.id, cause).await {
            tracing::error!(error = %e, request_id = %request.id, "Failed to record request error");
        }
        self.events
            .publish(StorageEvent::StoreFailed {
                checksum: request.checksum.clone(),
                storage: request.storage.clone(),
                cause: cause.to_string(),
            })
            .await;
    }
}

#[async_trait]
impl DeletionProgress for ProgressRecorder {
    async fn deletion_succeeded(&self, request: &FileDeletionRequest) {
        if let Err(e) = self
            .file_references
            .delete(&request.storage, &request.checksum)
            .await
        {
            tracing::error!(
                error = %e,
                checksum = %request.checksum,
                storage = %request.storage,
                "Failed to remove file reference after deletion"
            );
        }
        if let Err(e) = self.deletion_requests.delete(request.id).await {
            tracing::error!(error = %e, request_id = %request.id, "Failed to remove completed deletion request");
        }
        tracing::info!(
            checksum = %request.checksum,
            storage = %request.storage,
            "Deletion request succeeded"
        );
        self.events
            .publish(StorageEvent::DeletionSucceeded {
                checksum: request.checksum.clone(),
                storage: request.storage.clone(),
            })
            .await;
    }

    async fn deletion_failed(&self, request: &FileDeletionRequest, cause: &str) {
        tracing::warn!(
            checksum = %request.checksum,
            storage = %request.storage,
            cause = %cause,
            "Deletion request failed"
        );
        if let Err(e) = self.deletion_requests.mark_error(request.id, cause).await {
            tracing::error!(error = %e, request_id = %request.id, "Failed to record request error");
        }
        self.events
            .publish(StorageEvent::DeletionFailed {
                checksum: request.checksum.clone(),
                storage: request.storage.clone(),
                cause: cause.to_string(),
            })
            .await;
    }
}

#[async_trait]
impl RestorationProgress for ProgressRecorder {
    async fn restoration_succeeded(
        &self,
        request: &FileCacheRequest,
        restored_path: &Path,
        file_size: i64,
        expiration_date: DateTime<Utc>,
    ) {
        let cache_file = CacheFile::internal(
            &request.checksum,
            &request.filename,
            &request.mime_type,
            file_size,
            restored_path.display().to_string(),
            expiration_date,
        );

        match self.cache_files.upsert(cache_file).await {
            Ok(()) => {
                if let Err(e) = self.cache_requests.delete(request.id).await {
                    tracing::error!(error = %e, request_id = %request.id, "Failed to remove completed restoration request");
                }
                tracing::info!(
                    checksum = %request.checksum,
                    storage = %request.storage,
                    path = %restored_path.display(),
                    "Restoration request succeeded"
                );
                self.events
                    .publish(StorageEvent::RestorationSucceeded {
                        checksum: request.checksum.clone(),
                        storage: request.storage.clone(),
                        restored_path: restored_path.display().to_string(),
                    })
                    .await;
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    checksum = %request.checksum,
                    "Failed to record restored cache file"
                );
                let cause = format!(
                    "restored to {} but failed to record cache entry: {}",
                    restored_path.display(),
                    e
                );
                if let Err(e) = self.cache_requests.mark_error(request.id, &cause).await {
                    tracing::error!(error = %e, request_id = %request.id, "Failed to record request error");
                }
            }
        }
    }

    async fn restoration_failed(&self, request: &FileCacheRequest, cause: &str) {
        tracing::warn!(
            checksum = %request.checksum,
            storage = %request.storage,
            cause = %cause,
            "Restoration request failed"
        );
        if let Err(e) = self.cache_requests.mark_error(request.id, cause).await {
            tracing::error!(error = %e, request_id = %request.id, "Failed to record request error");
        }
        self.events
            .publish(StorageEvent::RestorationFailed {
                checksum: request.checksum.clone(),
                storage: request.storage.clone(),
                cause: cause.to_string(),
            })
            .await;
    }
}

#[async_trait]
impl PendingActionProgress for ProgressRecorder {
    async fn pending_action_succeeded(&self, storage: &str, checksum: &str) {
        if let Err(e) = self
            .file_references
            .set_pending_action_remaining(storage, checksum, false)
            .await
        {
            tracing::error!(
                error = %e,
                checksum = %checksum,
                storage = %storage,
                "Failed to clear pending action flag"
            );
            return;
        }
        tracing::info!(checksum = %checksum, storage = %storage, "Pending action completed");
        self.events
            .publish(StorageEvent::PendingActionCompleted {
                checksum: checksum.to_string(),
                storage: storage.to_string(),
            })
            .await;
    }

    async fn pending_action_failed(&self, storage: &str, checksum: &str, cause: &str) {
        // The flag stays set; the failure is surfaced, not re-queued.
        tracing::warn!(
            checksum = %checksum,
            storage = %storage,
            cause = %cause,
            "Pending action failed"
        );
        self.events
            .publish(StorageEvent::PendingActionFailed {
                checksum: checksum.to_string(),
                storage: storage.to_string(),
                cause: cause.to_string(),
            })
            .await;
    }
}
