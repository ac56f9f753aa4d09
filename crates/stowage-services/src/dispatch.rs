//! Request dispatcher: heterogeneous batches → per-backend working subsets.
//!
//! Each request's target backend configuration is resolved, the backend's
//! `prepare_for_*` is invoked, and the per-backend responses are merged into
//! one `PreparationResponse` per request kind. A request whose backend cannot
//! be resolved, whose allocation fails, or that a backend fails to account
//! for becomes a per-request rejection; the batch itself never fails.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use stowage_core::models::{
    FileCacheRequest, FileDeletionRequest, FileStorageRequest, StorageLocationConfiguration,
};
use stowage_core::{AppError, StorageKind};
use stowage_db::StorageLocationConfigurationRepository;
use stowage_storage::{
    DeletionWorkingSubset, PreparationResponse, RestorationWorkingSubset, StorageBackend,
    StorageWorkingSubset, WorkingSubset,
};

use crate::resolver::BackendResolver;

/// Assigns a backend to storage requests not yet bound to one.
pub trait AllocationStrategy: Send + Sync {
    /// Storage location name for the request, or a per-request dispatch
    /// error cause.
    fn assign(
        &self,
        request: &FileStorageRequest,
        locations: &[StorageLocationConfiguration],
    ) -> Result<String, String>;
}

/// Default strategy: the first online location (by name).
pub struct FirstOnlineStrategy;

impl AllocationStrategy for FirstOnlineStrategy {
    fn assign(
        &self,
        _request: &FileStorageRequest,
        locations: &[StorageLocationConfiguration],
    ) -> Result<String, String> {
        let mut online: Vec<&StorageLocationConfiguration> = locations
            .iter()
            .filter(|location| location.kind == StorageKind::Online)
            .collect();
        online.sort_by(|a, b| a.name.cmp(&b.name));
        online
            .first()
            .map(|location| location.name.clone())
            .ok_or_else(|| "no online storage location available".to_string())
    }
}

trait HasRequestId {
    fn request_id(&self) -> Uuid;
}

impl HasRequestId for FileStorageRequest {
    fn request_id(&self) -> Uuid {
        self.id
    }
}

impl HasRequestId for FileDeletionRequest {
    fn request_id(&self) -> Uuid {
        self.id
    }
}

impl HasRequestId for FileCacheRequest {
    fn request_id(&self) -> Uuid {
        self.id
    }
}

/// Turns batches of pending requests into per-backend working subsets.
pub struct RequestDispatcher {
    resolver: Arc<BackendResolver>,
    locations: Arc<dyn StorageLocationConfigurationRepository>,
    allocation: Arc<dyn AllocationStrategy>,
}

impl RequestDispatcher {
    pub fn new(
        resolver: Arc<BackendResolver>,
        locations: Arc<dyn StorageLocationConfigurationRepository>,
        allocation: Arc<dyn AllocationStrategy>,
    ) -> Self {
        Self {
            resolver,
            locations,
            allocation,
        }
    }

    #[tracing::instrument(skip(self, requests), fields(count = requests.len()))]
    pub async fn prepare_for_storage(
        &self,
        requests: Vec<FileStorageRequest>,
    ) -> Result<PreparationResponse<StorageWorkingSubset>, AppError> {
        let mut response = PreparationResponse::new();
        let locations = self.locations.find_all().await?;

        let mut by_storage: HashMap<String, Vec<FileStorageRequest>> = HashMap::new();
        for mut request in requests {
            let storage = match &request.storage {
                Some(storage) => storage.clone(),
                None => match self.allocation.assign(&request, &locations) {
                    Ok(storage) => {
                        request.storage = Some(storage.clone());
                        storage
                    }
                    Err(cause) => {
                        tracing::warn!(
                            checksum = %request.checksum,
                            cause = %cause,
                            "Storage request could not be allocated"
                        );
                        response.reject(request.id, format!("dispatch error: {}", cause));
                        continue;
                    }
                },
            };
            by_storage.entry(storage).or_default().push(request);
        }

        for (storage, group) in by_storage {
            self.prepare_group(storage, group, &mut response, |backend, requests| {
                backend.prepare_for_storage(requests)
            })
            .await;
        }
        Ok(response)
    }

    #[tracing::instrument(skip(self, requests), fields(count = requests.len()))]
    pub async fn prepare_for_deletion(
        &self,
        requests: Vec<FileDeletionRequest>,
    ) -> Result<PreparationResponse<DeletionWorkingSubset>, AppError> {
        let mut response = PreparationResponse::new();
        let mut by_storage: HashMap<String, Vec<FileDeletionRequest>> = HashMap::new();
        for request in requests {
            by_storage
                .entry(request.storage.clone())
                .or_default()
                .push(request);
        }

        for (storage, group) in by_storage {
            self.prepare_group(storage, group, &mut response, |backend, requests| {
                backend.prepare_for_deletion(requests)
            })
            .await;
        }
        Ok(response)
    }

    #[tracing::instrument(skip(self, requests), fields(count = requests.len()))]
    pub async fn prepare_for_restoration(
        &self,
        requests: Vec<FileCacheRequest>,
    ) -> Result<PreparationResponse<RestorationWorkingSubset>, AppError> {
        let mut response = PreparationResponse::new();
        let mut by_storage: HashMap<String, Vec<FileCacheRequest>> = HashMap::new();
        for request in requests {
            by_storage
                .entry(request.storage.clone())
                .or_default()
                .push(request);
        }

        for (storage, group) in by_storage {
            self.prepare_group(storage, group, &mut response, |backend, requests| {
                backend.prepare_for_restoration(requests)
            })
            .await;
        }
        Ok(response)
    }

    /// Run one backend's preparation over its group and fold the result into
    /// `response`, enforcing that every request ends up accounted for.
    async fn prepare_group<R, S>(
        &self,
        storage: String,
        group: Vec<R>,
        response: &mut PreparationResponse<S>,
        prepare: impl Fn(&dyn StorageBackend, Vec<R>) -> PreparationResponse<S>,
    ) where
        R: HasRequestId,
        S: WorkingSubset,
    {
        let ids: Vec<Uuid> = group.iter().map(HasRequestId::request_id).collect();

        let backend = match self.resolver.resolve(&storage).await {
            Ok(backend) => backend,
            Err(e) => {
                tracing::warn!(storage = %storage, error = %e, "Cannot resolve storage backend");
                for id in ids {
                    response.reject(id, format!("cannot resolve storage {}: {}", storage, e));
                }
                return;
            }
        };

        let backend_response = prepare(backend.as_ref(), group);
        let accounted: HashSet<Uuid> = backend_response.accounted_ids().into_iter().collect();
        response.merge(backend_response);

        for id in ids {
            if !accounted.contains(&id) {
                // Backend bug: preparation silently dropped the request.
                tracing::warn!(
                    storage = %storage,
                    request_id = %id,
                    "Backend preparation did not account for request"
                );
                response.reject(
                    id,
                    format!("storage {} did not account for request during preparation", storage),
                );
            }
        }
    }
}
