//! Backend registry: maps a backend-type identifier to a constructor.
//!
//! Configuration parsing/validation lives in each backend's config struct
//! (a pure function); the registry only resolves the type identifier and
//! invokes the constructor with the validated location configuration.

use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

use stowage_core::models::StorageLocationConfiguration;

use crate::traits::{StorageBackend, StorageError, StorageResult};

/// Constructor for one backend type.
pub type BackendConstructor =
    fn(&StorageLocationConfiguration) -> StorageResult<Arc<dyn StorageBackend>>;

/// Registry of available backend types.
#[derive(Clone)]
pub struct BackendRegistry {
    constructors: HashMap<String, BackendConstructor>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Create a registry with every built-in backend registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "storage-local")]
        {
            registry.register("local", |conf| {
                let backend: Arc<dyn StorageBackend> =
                    Arc::new(crate::local::LocalStorage::from_configuration(conf)?);
                Ok(backend)
            });
            registry.register("staged", |conf| {
                let backend: Arc<dyn StorageBackend> =
                    Arc::new(crate::staged::StagedStorage::from_configuration(conf)?);
                Ok(backend)
            });
        }

        #[cfg(feature = "storage-s3")]
        registry.register("s3", |conf| {
            let backend: Arc<dyn StorageBackend> =
                Arc::new(crate::s3::S3Storage::from_configuration(conf)?);
            Ok(backend)
        });

        registry
    }

    pub fn register(&mut self, backend_type: impl Into<String>, constructor: BackendConstructor) {
        self.constructors.insert(backend_type.into(), constructor);
    }

    pub fn contains(&self, backend_type: &str) -> bool {
        self.constructors.contains_key(backend_type)
    }

    pub fn backend_types(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Construct a backend instance for a storage location configuration.
    pub fn create(
        &self,
        conf: &StorageLocationConfiguration,
    ) -> StorageResult<Arc<dyn StorageBackend>> {
        conf.validate().map_err(|e| {
            StorageError::ConfigError(format!("invalid storage location {}: {}", conf.name, e))
        })?;

        let constructor = self.constructors.get(&conf.backend_type).ok_or_else(|| {
            StorageError::ConfigError(format!(
                "unknown backend type {} for storage location {}",
                conf.backend_type, conf.name
            ))
        })?;

        let backend = constructor(conf)?;
        tracing::debug!(
            storage = %conf.name,
            backend_type = %conf.backend_type,
            kind = %backend.kind(),
            "Storage backend constructed"
        );
        Ok(backend)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
