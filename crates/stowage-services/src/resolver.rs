//! Backend resolver: storage location name → constructed backend instance.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use stowage_core::models::StorageLocationConfiguration;
use stowage_core::AppError;
use stowage_db::StorageLocationConfigurationRepository;
use stowage_storage::{BackendRegistry, StorageBackend};

/// Resolves storage location names to backend instances.
///
/// Instances are constructed once through the registry and cached;
/// thread-safe and async-compatible using tokio's RwLock.
pub struct BackendResolver {
    locations: Arc<dyn StorageLocationConfigurationRepository>,
    registry: BackendRegistry,
    instances: RwLock<HashMap<String, Arc<dyn StorageBackend>>>,
}

impl BackendResolver {
    pub fn new(
        locations: Arc<dyn StorageLocationConfigurationRepository>,
        registry: BackendRegistry,
    ) -> Self {
        Self {
            locations,
            registry,
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Get the backend instance for a storage location name, constructing it
    /// on first use.
    pub async fn resolve(&self, storage: &str) -> Result<Arc<dyn StorageBackend>, AppError> {
        if let Some(backend) = self.instances.read().await.get(storage) {
            return Ok(backend.clone());
        }

        let conf = self
            .locations
            .find_by_name(storage)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("unknown storage location {}", storage)))?;

        let backend = self
            .registry
            .create(&conf)
            .map_err(|e| AppError::Storage(e.to_string()))?;

        self.instances
            .write()
            .await
            .insert(storage.to_string(), backend.clone());
        Ok(backend)
    }

    /// Configuration of a storage location, if known.
    pub async fn location(
        &self,
        storage: &str,
    ) -> Result<Option<StorageLocationConfiguration>, AppError> {
        self.locations.find_by_name(storage).await
    }

    /// Seed a pre-built backend instance (custom backends, tests).
    pub async fn insert(&self, storage: impl Into<String>, backend: Arc<dyn StorageBackend>) {
        self.instances.write().await.insert(storage.into(), backend);
    }

    /// Drop a cached instance so the next resolve reconstructs it (e.g.
    /// after a configuration change).
    pub async fn invalidate(&self, storage: &str) {
        self.instances.write().await.remove(storage);
    }
}
