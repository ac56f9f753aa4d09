//! Recording progress managers shared by backend unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

use stowage_core::models::{FileCacheRequest, FileDeletionRequest, FileStorageRequest};

use crate::progress::{
    DeletionProgress, PendingActionProgress, RestorationProgress, StorageProgress,
};

#[derive(Default)]
pub struct RecordingStorageProgress {
    pub succeeded: Mutex<Vec<(Uuid, String, i64)>>,
    pub pending: Mutex<Vec<(Uuid, String, i64, bool)>>,
    pub failed: Mutex<Vec<(Uuid, String)>>,
}

#[async_trait]
impl StorageProgress for RecordingStorageProgress {
    async fn storage_succeeded(
        &self,
        request: &FileStorageRequest,
        stored_url: &str,
        file_size: i64,
    ) {
        self.succeeded
            .lock()
            .unwrap()
            .push((request.id, stored_url.to_string(), file_size));
    }

    async fn storage_succeeded_with_pending_action(
        &self,
        request: &FileStorageRequest,
        stored_url: &str,
        file_size: i64,
        notify_administrators: bool,
    ) {
        self.pending.lock().unwrap().push((
            request.id,
            stored_url.to_string(),
            file_size,
            notify_administrators,
        ));
    }

    async fn storage_failed(&self, request: &FileStorageRequest, cause: &str) {
        self.failed
            .lock()
            .unwrap()
            .push((request.id, cause.to_string()));
    }
}

#[derive(Default)]
pub struct RecordingDeletionProgress {
    pub succeeded: Mutex<Vec<Uuid>>,
    pub failed: Mutex<Vec<(Uuid, String)>>,
}

#[async_trait]
impl DeletionProgress for RecordingDeletionProgress {
    async fn deletion_succeeded(&self, request: &FileDeletionRequest) {
        self.succeeded.lock().unwrap().push(request.id);
    }

    async fn deletion_failed(&self, request: &FileDeletionRequest, cause: &str) {
        self.failed
            .lock()
            .unwrap()
            .push((request.id, cause.to_string()));
    }
}

#[derive(Default)]
pub struct RecordingRestorationProgress {
    pub succeeded: Mutex<Vec<(Uuid, PathBuf, i64, DateTime<Utc>)>>,
    pub failed: Mutex<Vec<(Uuid, String)>>,
}

#[async_trait]
impl RestorationProgress for RecordingRestorationProgress {
    async fn restoration_succeeded(
        &self,
        request: &FileCacheRequest,
        restored_path: &Path,
        file_size: i64,
        expiration_date: DateTime<Utc>,
    ) {
        self.succeeded.lock().unwrap().push((
            request.id,
            restored_path.to_path_buf(),
            file_size,
            expiration_date,
        ));
    }

    async fn restoration_failed(&self, request: &FileCacheRequest, cause: &str) {
        self.failed
            .lock()
            .unwrap()
            .push((request.id, cause.to_string()));
    }
}

#[derive(Default)]
pub struct RecordingPendingActionProgress {
    pub succeeded: Mutex<Vec<(String, String)>>,
    pub failed: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl PendingActionProgress for RecordingPendingActionProgress {
    async fn pending_action_succeeded(&self, storage: &str, checksum: &str) {
        self.succeeded
            .lock()
            .unwrap()
            .push((storage.to_string(), checksum.to_string()));
    }

    async fn pending_action_failed(&self, storage: &str, checksum: &str, cause: &str) {
        self.failed.lock().unwrap().push((
            storage.to_string(),
            checksum.to_string(),
            cause.to_string(),
        ));
    }
}
