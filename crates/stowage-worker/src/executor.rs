//! Working subset executor.
//!
//! Each subset is handed to its backend exactly once, with the progress
//! manager wrapped in a first-callback-wins tracker. After execution, every
//! request the backend did not report on receives an implicit failure: a
//! backend `Err` (or panic) fails the whole remainder of the subset, and a
//! subset that completes without a callback for some request is a backend
//! bug, never a silent success. Duplicate callbacks are dropped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use uuid::Uuid;

use stowage_core::Config;
use stowage_services::progress::ProgressRecorder;
use stowage_services::resolver::BackendResolver;
use stowage_storage::progress::{DeletionProgress, RestorationProgress, StorageProgress};
use stowage_storage::{
    DeletionWorkingSubset, RestorationWorkingSubset, StorageWorkingSubset, WorkingSubset,
};

#[derive(Clone)]
pub struct SubsetExecutorConfig {
    pub max_concurrent_subsets: usize,
}

impl Default for SubsetExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_subsets: 4,
        }
    }
}

impl SubsetExecutorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrent_subsets: config.executor_max_concurrent_subsets,
        }
    }
}

/// Executes working subsets against their backends.
pub struct SubsetExecutor {
    resolver: Arc<BackendResolver>,
    storage_progress: Arc<dyn StorageProgress>,
    deletion_progress: Arc<dyn DeletionProgress>,
    restoration_progress: Arc<dyn RestorationProgress>,
    semaphore: Arc<Semaphore>,
}

impl SubsetExecutor {
    pub fn new(
        resolver: Arc<BackendResolver>,
        storage_progress: Arc<dyn StorageProgress>,
        deletion_progress: Arc<dyn DeletionProgress>,
        restoration_progress: Arc<dyn RestorationProgress>,
        config: SubsetExecutorConfig,
    ) -> Self {
        Self {
            resolver,
            storage_progress,
            deletion_progress,
            restoration_progress,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_subsets.max(1))),
        }
    }

    /// Wire every progress protocol to one repository-backed recorder.
    pub fn with_recorder(
        resolver: Arc<BackendResolver>,
        recorder: Arc<ProgressRecorder>,
        config: SubsetExecutorConfig,
    ) -> Self {
        Self::new(
            resolver,
            recorder.clone(),
            recorder.clone(),
            recorder,
            config,
        )
    }

    /// Execute storage subsets concurrently; returns when all complete.
    pub async fn execute_storage_batch(&self, subsets: Vec<StorageWorkingSubset>) {
        let tasks: Vec<_> = subsets
            .into_iter()
            .map(|subset| {
                let resolver = self.resolver.clone();
                let progress = self.storage_progress.clone();
                let semaphore = self.semaphore.clone();
                tokio::spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return,
                    };
                    run_storage_subset(resolver, progress, subset).await;
                })
            })
            .collect();
        for task in tasks {
            let _ = task.await;
        }
    }

    /// Execute deletion subsets concurrently; returns when all complete.
    pub async fn execute_deletion_batch(&self, subsets: Vec<DeletionWorkingSubset>) {
        let tasks: Vec<_> = subsets
            .into_iter()
            .map(|subset| {
                let resolver = self.resolver.clone();
                let progress = self.deletion_progress.clone();
                let semaphore = self.semaphore.clone();
                tokio::spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return,
                    };
                    run_deletion_subset(resolver, progress, subset).await;
                })
            })
            .collect();
        for task in tasks {
            let _ = task.await;
        }
    }

    /// Execute restoration subsets concurrently; returns when all complete.
    pub async fn execute_restoration_batch(&self, subsets: Vec<RestorationWorkingSubset>) {
        let tasks: Vec<_> = subsets
            .into_iter()
            .map(|subset| {
                let resolver = self.resolver.clone();
                let progress = self.restoration_progress.clone();
                let semaphore = self.semaphore.clone();
                tokio::spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return,
                    };
                    run_restoration_subset(resolver, progress, subset).await;
                })
            })
            .collect();
        for task in tasks {
            let _ = task.await;
        }
    }
}

/// First-callback-wins set shared by the tracking wrappers.
struct CallbackTracker {
    remaining: Mutex<HashSet<Uuid>>,
}

impl CallbackTracker {
    fn new(ids: Vec<Uuid>) -> Self {
        Self {
            remaining: Mutex::new(ids.into_iter().collect()),
        }
    }

    /// True when this is the first callback for the request.
    fn claim(&self, id: Uuid) -> bool {
        let claimed = self.remaining.lock().unwrap().remove(&id);
        if !claimed {
            tracing::warn!(request_id = %id, "Duplicate progress callback ignored");
        }
        claimed
    }

    fn unreported(&self) -> HashSet<Uuid> {
        self.remaining.lock().unwrap().clone()
    }
}

struct TrackingStorageProgress {
    inner: Arc<dyn StorageProgress>,
    tracker: Arc<CallbackTracker>,
}

#[async_trait]
impl StorageProgress for TrackingStorageProgress {
    async fn storage_succeeded(
        &self,
        request: &stowage_core::models::FileStorageRequest,
        stored_url: &str,
        file_size: i64,
    ) {
        if self.tracker.claim(request.id) {
            self.inner
                .storage_succeeded(request, stored_url, file_size)
                .await;
        }
    }

    async fn storage_succeeded_with_pending_action(
        &self,
        request: &stowage_core::models::FileStorageRequest,
        stored_url: &str,
        file_size: i64,
        notify_administrators: bool,
    ) {
        if self.tracker.claim(request.id) {
            self.inner
                .storage_succeeded_with_pending_action(
                    request,
                    stored_url,
                    file_size,
                    notify_administrators,
                )
                .await;
        }
    }

    async fn storage_failed(
        &self,
        request: &stowage_core::models::FileStorageRequest,
        cause: &str,
    ) {
        if self.tracker.claim(request.id) {
            self.inner.storage_failed(request, cause).await;
        }
    }
}

struct TrackingDeletionProgress {
    inner: Arc<dyn DeletionProgress>,
    tracker: Arc<CallbackTracker>,
}

#[async_trait]
impl DeletionProgress for TrackingDeletionProgress {
    async fn deletion_succeeded(&self, request: &stowage_core::models::FileDeletionRequest) {
        if self.tracker.claim(request.id) {
            self.inner.deletion_succeeded(request).await;
        }
    }

    async fn deletion_failed(
        &self,
        request: &stowage_core::models::FileDeletionRequest,
        cause: &str,
    ) {
        if self.tracker.claim(request.id) {
            self.inner.deletion_failed(request, cause).await;
        }
    }
}

struct TrackingRestorationProgress {
    inner: Arc<dyn RestorationProgress>,
    tracker: Arc<CallbackTracker>,
}

#[async_trait]
impl RestorationProgress for TrackingRestorationProgress {
    async fn restoration_succeeded(
        &self,
        request: &stowage_core::models::FileCacheRequest,
        restored_path: &std::path::Path,
        file_size: i64,
        expiration_date: chrono::DateTime<chrono::Utc>,
    ) {
        if self.tracker.claim(request.id) {
            self.inner
                .restoration_succeeded(request, restored_path, file_size, expiration_date)
                .await;
        }
    }

    async fn restoration_failed(
        &self,
        request: &stowage_core::models::FileCacheRequest,
        cause: &str,
    ) {
        if self.tracker.claim(request.id) {
            self.inner.restoration_failed(request, cause).await;
        }
    }
}

/// Cause for a request the backend never reported on.
fn implicit_failure_cause(fault: &Option<String>, operation: &str) -> String {
    match fault {
        Some(message) => format!("{} backend failure: {}", operation, message),
        None => format!("{} backend reported no outcome for this request", operation),
    }
}

async fn run_storage_subset(
    resolver: Arc<BackendResolver>,
    progress: Arc<dyn StorageProgress>,
    subset: StorageWorkingSubset,
) {
    let storage = subset.storage().to_string();
    let requests = subset.requests().to_vec();
    let tracker = Arc::new(CallbackTracker::new(subset.request_ids()));

    let backend = match resolver.resolve(&storage).await {
        Ok(backend) => backend,
        Err(e) => {
            for request in &requests {
                progress
                    .storage_failed(request, &format!("cannot resolve storage {}: {}", storage, e))
                    .await;
            }
            return;
        }
    };

    let tracking: Arc<dyn StorageProgress> = Arc::new(TrackingStorageProgress {
        inner: progress.clone(),
        tracker: tracker.clone(),
    });

    let result = tokio::spawn(async move { backend.store(subset, tracking).await }).await;

    let fault = match result {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(e) => Some(format!("panicked: {}", e)),
    };
    if let Some(ref message) = fault {
        tracing::error!(storage = %storage, error = %message, "Storage subset execution faulted");
    }

    let unreported = tracker.unreported();
    for request in requests.iter().filter(|r| unreported.contains(&r.id)) {
        progress
            .storage_failed(request, &implicit_failure_cause(&fault, "storage"))
            .await;
    }
}

async fn run_deletion_subset(
    resolver: Arc<BackendResolver>,
    progress: Arc<dyn DeletionProgress>,
    subset: DeletionWorkingSubset,
) {
    let storage = subset.storage().to_string();
    let requests = subset.requests().to_vec();
    let tracker = Arc::new(CallbackTracker::new(subset.request_ids()));

    let backend = match resolver.resolve(&storage).await {
        Ok(backend) => backend,
        Err(e) => {
            for request in &requests {
                progress
                    .deletion_failed(request, &format!("cannot resolve storage {}: {}", storage, e))
                    .await;
            }
            return;
        }
    };

    let tracking: Arc<dyn DeletionProgress> = Arc::new(TrackingDeletionProgress {
        inner: progress.clone(),
        tracker: tracker.clone(),
    });

    let result = tokio::spawn(async move { backend.delete(subset, tracking).await }).await;

    let fault = match result {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(e) => Some(format!("panicked: {}", e)),
    };
    if let Some(ref message) = fault {
        tracing::error!(storage = %storage, error = %message, "Deletion subset execution faulted");
    }

    let unreported = tracker.unreported();
    for request in requests.iter().filter(|r| unreported.contains(&r.id)) {
        progress
            .deletion_failed(request, &implicit_failure_cause(&fault, "deletion"))
            .await;
    }
}

async fn run_restoration_subset(
    resolver: Arc<BackendResolver>,
    progress: Arc<dyn RestorationProgress>,
    subset: RestorationWorkingSubset,
) {
    let storage = subset.storage().to_string();
    let requests = subset.requests().to_vec();
    let tracker = Arc::new(CallbackTracker::new(subset.request_ids()));

    let backend = match resolver.resolve(&storage).await {
        Ok(backend) => backend,
        Err(e) => {
            for request in &requests {
                progress
                    .restoration_failed(
                        request,
                        &format!("cannot resolve storage {}: {}", storage, e),
                    )
                    .await;
            }
            return;
        }
    };

    let tracking: Arc<dyn RestorationProgress> = Arc::new(TrackingRestorationProgress {
        inner: progress.clone(),
        tracker: tracker.clone(),
    });

    let result = tokio::spawn(async move { backend.retrieve(subset, tracking).await }).await;

    let fault = match result {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(e) => Some(format!("panicked: {}", e)),
    };
    if let Some(ref message) = fault {
        tracing::error!(storage = %storage, error = %message, "Restoration subset execution faulted");
    }

    let unreported = tracker.unreported();
    for request in requests.iter().filter(|r| unreported.contains(&r.id)) {
        progress
            .restoration_failed(request, &implicit_failure_cause(&fault, "restoration"))
            .await;
    }
}
