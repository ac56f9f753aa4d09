//! Mock repository implementations for testing
//!
//! These mocks allow testing the orchestration services without database
//! dependencies.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use stowage_core::models::{
    CacheFile, FileCacheRequest, FileDeletionRequest, FileReference, FileStorageRequest,
    StorageLocationConfiguration,
};
use stowage_core::{AppError, StorageKind};
use stowage_db::{
    CacheFileRepository, FileReferenceRepository, RequestRepository,
    StorageLocationConfigurationRepository,
};

use crate::events::{EventPublisher, StorageEvent};

/// In-memory file reference repository keyed by (storage, checksum).
#[derive(Clone, Default)]
pub struct MockFileReferenceRepository {
    rows: Arc<Mutex<HashMap<(String, String), FileReference>>>,
}

impl MockFileReferenceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, reference: FileReference) {
        self.rows.lock().unwrap().insert(
            (
                reference.location.storage.clone(),
                reference.checksum.clone(),
            ),
            reference,
        );
    }

    pub fn get(&self, storage: &str, checksum: &str) -> Option<FileReference> {
        self.rows
            .lock()
            .unwrap()
            .get(&(storage.to_string(), checksum.to_string()))
            .cloned()
    }
}

#[async_trait]
impl FileReferenceRepository for MockFileReferenceRepository {
    async fn save(&self, reference: FileReference) -> Result<FileReference, AppError> {
        self.add(reference.clone());
        Ok(reference)
    }

    async fn find_by_checksums(
        &self,
        checksums: &[String],
    ) -> Result<Vec<FileReference>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| checksums.contains(&r.checksum))
            .cloned()
            .collect())
    }

    async fn find_by_storage_and_checksum(
        &self,
        storage: &str,
        checksum: &str,
    ) -> Result<Option<FileReference>, AppError> {
        Ok(self.get(storage, checksum))
    }

    async fn confirm_nearline_unavailable(
        &self,
        storage: &str,
        checksum: &str,
    ) -> Result<(), AppError> {
        if let Some(reference) = self
            .rows
            .lock()
            .unwrap()
            .get_mut(&(storage.to_string(), checksum.to_string()))
        {
            reference.nearline_confirmed = true;
        }
        Ok(())
    }

    async fn set_pending_action_remaining(
        &self,
        storage: &str,
        checksum: &str,
        pending: bool,
    ) -> Result<(), AppError> {
        if let Some(reference) = self
            .rows
            .lock()
            .unwrap()
            .get_mut(&(storage.to_string(), checksum.to_string()))
        {
            reference.location.pending_action_remaining = pending;
        }
        Ok(())
    }

    async fn delete(&self, storage: &str, checksum: &str) -> Result<(), AppError> {
        self.rows
            .lock()
            .unwrap()
            .remove(&(storage.to_string(), checksum.to_string()));
        Ok(())
    }
}

/// In-memory cache ledger keyed by checksum.
#[derive(Clone, Default)]
pub struct MockCacheFileRepository {
    rows: Arc<Mutex<HashMap<String, CacheFile>>>,
}

impl MockCacheFileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, cache_file: CacheFile) {
        self.rows
            .lock()
            .unwrap()
            .insert(cache_file.checksum.clone(), cache_file);
    }

    pub fn get(&self, checksum: &str) -> Option<CacheFile> {
        self.rows.lock().unwrap().get(checksum).cloned()
    }

    pub fn contains(&self, checksum: &str) -> bool {
        self.rows.lock().unwrap().contains_key(checksum)
    }
}

#[async_trait]
impl CacheFileRepository for MockCacheFileRepository {
    async fn upsert(&self, cache_file: CacheFile) -> Result<(), AppError> {
        self.add(cache_file);
        Ok(())
    }

    async fn find_by_checksum(&self, checksum: &str) -> Result<Option<CacheFile>, AppError> {
        Ok(self.get(checksum))
    }

    async fn find_by_checksums(&self, checksums: &[String]) -> Result<Vec<CacheFile>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|c| checksums.contains(&c.checksum))
            .cloned()
            .collect())
    }

    async fn delete_by_checksum(&self, checksum: &str) -> Result<(), AppError> {
        self.rows.lock().unwrap().remove(checksum);
        Ok(())
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<CacheFile>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.is_expired(now))
            .cloned()
            .collect())
    }
}

/// In-memory storage location configuration repository keyed by name.
#[derive(Clone, Default)]
pub struct MockStorageLocationRepository {
    rows: Arc<Mutex<HashMap<String, StorageLocationConfiguration>>>,
}

impl MockStorageLocationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, configuration: StorageLocationConfiguration) {
        self.rows
            .lock()
            .unwrap()
            .insert(configuration.name.clone(), configuration);
    }
}

#[async_trait]
impl StorageLocationConfigurationRepository for MockStorageLocationRepository {
    async fn save(
        &self,
        configuration: StorageLocationConfiguration,
    ) -> Result<StorageLocationConfiguration, AppError> {
        self.add(configuration.clone());
        Ok(configuration)
    }

    async fn find_by_name(
        &self,
        name: &str,
    ) -> Result<Option<StorageLocationConfiguration>, AppError> {
        Ok(self.rows.lock().unwrap().get(name).cloned())
    }

    async fn find_all(&self) -> Result<Vec<StorageLocationConfiguration>, AppError> {
        let mut all: Vec<StorageLocationConfiguration> =
            self.rows.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn find_by_kind(
        &self,
        kind: StorageKind,
    ) -> Result<Vec<StorageLocationConfiguration>, AppError> {
        let mut matching: Vec<StorageLocationConfiguration> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.kind == kind)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matching)
    }
}

/// Requests stored by the generic in-memory request repository.
pub trait TestRequest: Clone + Send + Sync + 'static {
    fn id(&self) -> Uuid;
}

impl TestRequest for FileStorageRequest {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl TestRequest for FileDeletionRequest {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl TestRequest for FileCacheRequest {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// In-memory pending request queue.
pub struct MockRequestRepository<R> {
    rows: Arc<Mutex<HashMap<Uuid, R>>>,
    errors: Arc<Mutex<HashMap<Uuid, String>>>,
}

impl<R> Default for MockRequestRepository<R> {
    fn default() -> Self {
        Self {
            rows: Arc::new(Mutex::new(HashMap::new())),
            errors: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<R> Clone for MockRequestRepository<R> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
            errors: self.errors.clone(),
        }
    }
}

impl<R: TestRequest> MockRequestRepository<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, request: R) {
        self.rows.lock().unwrap().insert(request.id(), request);
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.rows.lock().unwrap().contains_key(&id)
    }

    pub fn error_of(&self, id: Uuid) -> Option<String> {
        self.errors.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<R: TestRequest> RequestRepository<R> for MockRequestRepository<R> {
    async fn save(&self, request: R) -> Result<R, AppError> {
        self.add(request.clone());
        Ok(request)
    }

    async fn find_pending(&self, limit: i64) -> Result<Vec<R>, AppError> {
        let errors = self.errors.lock().unwrap();
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| !errors.contains_key(&r.id()))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        self.rows.lock().unwrap().remove(&id);
        self.errors.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn mark_error(&self, id: Uuid, cause: &str) -> Result<(), AppError> {
        self.errors.lock().unwrap().insert(id, cause.to_string());
        Ok(())
    }
}

/// Event publisher that records every published event.
#[derive(Default)]
pub struct RecordingEventPublisher {
    pub events: Mutex<Vec<StorageEvent>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, event: StorageEvent) {
        self.events.lock().unwrap().push(event);
    }
}
