//! Scriptable storage backend for service and executor tests.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use stowage_core::models::{
    FileCacheRequest, FileDeletionRequest, FileReference, FileStorageRequest,
};
use stowage_core::StorageKind;
use stowage_storage::progress::{
    DeletionProgress, PendingActionProgress, RestorationProgress, StorageProgress,
};
use stowage_storage::{
    Availability, DeletionWorkingSubset, DownloadStream, PreparationResponse,
    RestorationWorkingSubset, StorageBackend, StorageError, StorageResult, StorageWorkingSubset,
};

/// How the mock behaves during `store` execution.
#[derive(Clone)]
pub enum MockStoreMode {
    /// Report success for every request.
    Succeed,
    /// Report success for every request, with a pending action.
    SucceedWithPendingAction,
    /// Report nothing for the listed requests (a backend bug).
    SilentlyDrop(HashSet<Uuid>),
    /// Fail the whole subset by returning an error.
    Fault(String),
    /// Report success twice for every request (a backend bug).
    DuplicateReports,
}

/// How the mock behaves during preparation.
#[derive(Clone)]
pub enum MockPrepareMode {
    /// One working subset holding every request.
    Normal,
    /// Leave the listed requests out of subsets and rejections (a backend
    /// bug the dispatcher must catch).
    SilentlyDrop(HashSet<Uuid>),
}

/// Scripted outcome of a `download` call.
#[derive(Clone)]
pub enum MockDownloadBehavior {
    Bytes(Vec<u8>),
    NotAvailable,
    Transient,
}

/// Scriptable backend recording call counts.
pub struct MockBackend {
    name: String,
    kind: StorageKind,
    availability: Mutex<HashMap<String, Availability>>,
    availability_errors: Mutex<HashSet<String>>,
    availability_calls: AtomicUsize,
    availability_calls_by_checksum: Mutex<HashMap<String, usize>>,
    downloads: Mutex<HashMap<String, MockDownloadBehavior>>,
    download_calls: AtomicUsize,
    store_mode: Mutex<MockStoreMode>,
    prepare_mode: Mutex<MockPrepareMode>,
}

impl MockBackend {
    pub fn new(name: impl Into<String>, kind: StorageKind) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            kind,
            availability: Mutex::new(HashMap::new()),
            availability_errors: Mutex::new(HashSet::new()),
            availability_calls: AtomicUsize::new(0),
            availability_calls_by_checksum: Mutex::new(HashMap::new()),
            downloads: Mutex::new(HashMap::new()),
            download_calls: AtomicUsize::new(0),
            store_mode: Mutex::new(MockStoreMode::Succeed),
            prepare_mode: Mutex::new(MockPrepareMode::Normal),
        })
    }

    pub fn online(name: impl Into<String>) -> Arc<Self> {
        Self::new(name, StorageKind::Online)
    }

    pub fn nearline(name: impl Into<String>) -> Arc<Self> {
        Self::new(name, StorageKind::Nearline)
    }

    pub fn offline(name: impl Into<String>) -> Arc<Self> {
        Self::new(name, StorageKind::Offline)
    }

    pub fn set_availability(&self, checksum: &str, availability: Availability) {
        self.availability
            .lock()
            .unwrap()
            .insert(checksum.to_string(), availability);
    }

    pub fn set_availability_error(&self, checksum: &str) {
        self.availability_errors
            .lock()
            .unwrap()
            .insert(checksum.to_string());
    }

    pub fn set_download(&self, checksum: &str, behavior: MockDownloadBehavior) {
        self.downloads
            .lock()
            .unwrap()
            .insert(checksum.to_string(), behavior);
    }

    pub fn set_store_mode(&self, mode: MockStoreMode) {
        *self.store_mode.lock().unwrap() = mode;
    }

    pub fn set_prepare_mode(&self, mode: MockPrepareMode) {
        *self.prepare_mode.lock().unwrap() = mode;
    }

    pub fn availability_call_count(&self) -> usize {
        self.availability_calls.load(Ordering::SeqCst)
    }

    pub fn availability_calls_for(&self, checksum: &str) -> usize {
        self.availability_calls_by_checksum
            .lock()
            .unwrap()
            .get(checksum)
            .copied()
            .unwrap_or(0)
    }

    pub fn download_call_count(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    fn mock_url(&self, checksum: &str) -> String {
        format!("mock://{}/{}", self.name, checksum)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StorageKind {
        self.kind
    }

    fn prepare_for_storage(
        &self,
        requests: Vec<FileStorageRequest>,
    ) -> PreparationResponse<StorageWorkingSubset> {
        let mode = self.prepare_mode.lock().unwrap().clone();
        let mut response = PreparationResponse::new();
        let requests: Vec<FileStorageRequest> = match mode {
            MockPrepareMode::Normal => requests,
            MockPrepareMode::SilentlyDrop(ids) => requests
                .into_iter()
                .filter(|r| !ids.contains(&r.id))
                .collect(),
        };
        if !requests.is_empty() {
            response.add_working_subset(StorageWorkingSubset::new(self.name.clone(), requests));
        }
        response
    }

    fn prepare_for_deletion(
        &self,
        requests: Vec<FileDeletionRequest>,
    ) -> PreparationResponse<DeletionWorkingSubset> {
        let mut response = PreparationResponse::new();
        if !requests.is_empty() {
            response.add_working_subset(DeletionWorkingSubset::new(self.name.clone(), requests));
        }
        response
    }

    fn prepare_for_restoration(
        &self,
        requests: Vec<FileCacheRequest>,
    ) -> PreparationResponse<RestorationWorkingSubset> {
        let mut response = PreparationResponse::new();
        if !requests.is_empty() {
            response.add_working_subset(RestorationWorkingSubset::new(self.name.clone(), requests));
        }
        response
    }

    async fn store(
        &self,
        subset: StorageWorkingSubset,
        progress: Arc<dyn StorageProgress>,
    ) -> StorageResult<()> {
        let mode = self.store_mode.lock().unwrap().clone();
        match mode {
            MockStoreMode::Succeed => {
                for request in subset.into_requests() {
                    let url = self.mock_url(&request.checksum);
                    progress.storage_succeeded(&request, &url, 4).await;
                }
            }
            MockStoreMode::SucceedWithPendingAction => {
                for request in subset.into_requests() {
                    let url = self.mock_url(&request.checksum);
                    progress
                        .storage_succeeded_with_pending_action(&request, &url, 4, true)
                        .await;
                }
            }
            MockStoreMode::SilentlyDrop(ids) => {
                for request in subset.into_requests() {
                    if ids.contains(&request.id) {
                        continue;
                    }
                    let url = self.mock_url(&request.checksum);
                    progress.storage_succeeded(&request, &url, 4).await;
                }
            }
            MockStoreMode::Fault(message) => {
                return Err(StorageError::BackendError(message));
            }
            MockStoreMode::DuplicateReports => {
                for request in subset.into_requests() {
                    let url = self.mock_url(&request.checksum);
                    progress.storage_succeeded(&request, &url, 4).await;
                    progress.storage_succeeded(&request, &url, 4).await;
                }
            }
        }
        Ok(())
    }

    async fn delete(
        &self,
        subset: DeletionWorkingSubset,
        progress: Arc<dyn DeletionProgress>,
    ) -> StorageResult<()> {
        for request in subset.into_requests() {
            progress.deletion_succeeded(&request).await;
        }
        Ok(())
    }

    async fn retrieve(
        &self,
        subset: RestorationWorkingSubset,
        progress: Arc<dyn RestorationProgress>,
    ) -> StorageResult<()> {
        for request in subset.into_requests() {
            let restored = PathBuf::from(&request.destination_path).join(&request.checksum);
            progress
                .restoration_succeeded(
                    &request,
                    &restored,
                    request.file_size,
                    Utc::now() + Duration::hours(1),
                )
                .await;
        }
        Ok(())
    }

    async fn check_availability(&self, reference: &FileReference) -> StorageResult<Availability> {
        self.availability_calls.fetch_add(1, Ordering::SeqCst);
        *self
            .availability_calls_by_checksum
            .lock()
            .unwrap()
            .entry(reference.checksum.clone())
            .or_insert(0) += 1;

        if self
            .availability_errors
            .lock()
            .unwrap()
            .contains(&reference.checksum)
        {
            return Err(StorageError::AvailabilityCheck("scripted failure".to_string()));
        }

        let scripted = self
            .availability
            .lock()
            .unwrap()
            .get(&reference.checksum)
            .cloned();
        Ok(scripted.unwrap_or_else(|| Availability::unavailable("unscripted checksum")))
    }

    async fn download(&self, reference: &FileReference) -> StorageResult<DownloadStream> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .downloads
            .lock()
            .unwrap()
            .get(&reference.checksum)
            .cloned();
        match behavior {
            Some(MockDownloadBehavior::Bytes(bytes)) => {
                let stream = futures::stream::iter(vec![Ok(Bytes::from(bytes))]);
                Ok(Box::pin(stream))
            }
            Some(MockDownloadBehavior::NotAvailable) | None => Err(StorageError::NotAvailable(
                format!("no fast tier copy of {}", reference.checksum),
            )),
            Some(MockDownloadBehavior::Transient) => Err(StorageError::DownloadFailed(
                "scripted transient failure".to_string(),
            )),
        }
    }

    fn validate_url(&self, url: &str, errors: &mut Vec<String>) -> bool {
        if url.starts_with(&format!("mock://{}/", self.name)) {
            true
        } else {
            errors.push(format!("URL {} is not owned by {}", url, self.name));
            false
        }
    }

    fn allows_physical_deletion(&self) -> bool {
        true
    }
}
