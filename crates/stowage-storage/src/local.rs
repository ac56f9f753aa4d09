use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use stowage_core::models::{
    FileCacheRequest, FileDeletionRequest, FileStorageRequest, StorageLocationConfiguration,
};
use stowage_core::StorageKind;

use crate::digest::verify_checksum;
use crate::progress::{DeletionProgress, StorageProgress};
use crate::subset::{
    DeletionWorkingSubset, PreparationResponse, RestorationWorkingSubset, StorageWorkingSubset,
};
use crate::traits::{StorageBackend, StorageError, StorageResult};
use crate::urls;

const DEFAULT_SUBSET_MAX_SIZE: usize = 100;

fn default_subset_max_size() -> usize {
    DEFAULT_SUBSET_MAX_SIZE
}

/// Backend-specific configuration for [`LocalStorage`].
#[derive(Debug, Clone, Deserialize)]
pub struct LocalStorageConfig {
    /// Root directory stored files live under.
    pub root: String,
    /// Maximum number of requests grouped into one working subset.
    #[serde(default = "default_subset_max_size")]
    pub subset_max_size: usize,
}

impl LocalStorageConfig {
    /// Parse and validate the configuration payload. Pure.
    pub fn parse(value: &serde_json::Value) -> StorageResult<Self> {
        let config: LocalStorageConfig = serde_json::from_value(value.clone()).map_err(|e| {
            StorageError::ConfigError(format!("invalid local storage configuration: {}", e))
        })?;
        if config.root.is_empty() {
            return Err(StorageError::ConfigError(
                "local storage root must not be empty".to_string(),
            ));
        }
        if config.subset_max_size == 0 {
            return Err(StorageError::ConfigError(
                "subset_max_size must be positive".to_string(),
            ));
        }
        Ok(config)
    }
}

/// Local filesystem storage backend (online or offline tier).
///
/// Files are stored content-addressed: `{root}/{subdirectory?}/{checksum}`.
#[derive(Clone)]
pub struct LocalStorage {
    name: String,
    kind: StorageKind,
    root: PathBuf,
    subset_max_size: usize,
}

impl LocalStorage {
    /// Build an instance for a validated storage location configuration.
    pub fn from_configuration(conf: &StorageLocationConfiguration) -> StorageResult<Self> {
        let config = LocalStorageConfig::parse(&conf.configuration)?;
        if conf.kind == StorageKind::Nearline {
            return Err(StorageError::ConfigError(format!(
                "local backend cannot serve nearline location {}",
                conf.name
            )));
        }
        Ok(Self {
            name: conf.name.clone(),
            kind: conf.kind,
            root: PathBuf::from(config.root),
            subset_max_size: config.subset_max_size,
        })
    }

    /// Destination path for a storage request, traversal-checked.
    fn destination_path(&self, request: &FileStorageRequest) -> StorageResult<PathBuf> {
        let key = match &request.subdirectory {
            Some(sub) => format!("{}/{}", sub.trim_matches('/'), request.checksum),
            None => request.checksum.clone(),
        };
        urls::validate_key(&key)?;
        Ok(self.root.join(key))
    }

    /// Resolve a stored-file URL, rejecting URLs outside this instance's root.
    fn owned_path(&self, url: &str) -> StorageResult<PathBuf> {
        let path = urls::file_url_to_path(url)?;
        if !path.starts_with(&self.root) {
            return Err(StorageError::InvalidUrl(format!(
                "URL {} is outside storage root {}",
                url,
                self.root.display()
            )));
        }
        Ok(path)
    }

    async fn ensure_parent_dir(path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn store_one(&self, request: &FileStorageRequest) -> StorageResult<(String, i64)> {
        let source = urls::file_url_to_path(&request.origin_url)?;
        let data = fs::read(&source).await.map_err(|e| {
            StorageError::StoreFailed(format!(
                "failed to read source {}: {}",
                source.display(),
                e
            ))
        })?;
        verify_checksum(&request.algorithm, &request.checksum, &data)?;

        let destination = self.destination_path(request)?;
        let size = data.len() as i64;
        let url = urls::path_to_file_url(&destination);

        // Content-addressed: an existing copy with the same checksum is the
        // same file.
        if fs::try_exists(&destination).await.unwrap_or(false) {
            tracing::debug!(
                storage = %self.name,
                checksum = %request.checksum,
                "file already stored, reusing existing copy"
            );
            return Ok((url, size));
        }

        Self::ensure_parent_dir(&destination).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&destination).await.map_err(|e| {
            StorageError::StoreFailed(format!(
                "failed to create file {}: {}",
                destination.display(),
                e
            ))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::StoreFailed(format!(
                "failed to write file {}: {}",
                destination.display(),
                e
            ))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::StoreFailed(format!(
                "failed to sync file {}: {}",
                destination.display(),
                e
            ))
        })?;

        tracing::info!(
            storage = %self.name,
            checksum = %request.checksum,
            path = %destination.display(),
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage store successful"
        );

        Ok((url, size))
    }

    /// Chunk a request group into subsets of at most `subset_max_size`.
    fn into_subsets<R, S>(
        &self,
        group: Vec<R>,
        make: impl Fn(String, Vec<R>) -> S,
        response: &mut PreparationResponse<S>,
    ) {
        let mut iter = group.into_iter().peekable();
        while iter.peek().is_some() {
            let chunk: Vec<R> = iter.by_ref().take(self.subset_max_size).collect();
            response.add_working_subset(make(self.name.clone(), chunk));
        }
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
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
        let mut response = PreparationResponse::new();
        let mut groups: HashMap<String, Vec<FileStorageRequest>> = HashMap::new();

        for request in requests {
            if let Err(e) = urls::file_url_to_path(&request.origin_url) {
                response.reject(request.id, format!("unreadable origin URL: {}", e));
                continue;
            }
            if let Err(e) = self.destination_path(&request) {
                response.reject(request.id, e.to_string());
                continue;
            }
            let subdirectory = request.subdirectory.clone().unwrap_or_default();
            groups.entry(subdirectory).or_default().push(request);
        }

        for (_, group) in groups {
            self.into_subsets(group, |s, r| StorageWorkingSubset::new(s, r), &mut response);
        }
        response
    }

    fn prepare_for_deletion(
        &self,
        requests: Vec<FileDeletionRequest>,
    ) -> PreparationResponse<DeletionWorkingSubset> {
        let mut response = PreparationResponse::new();
        let mut accepted = Vec::new();

        for request in requests {
            match self.owned_path(&request.file_url) {
                Ok(_) => accepted.push(request),
                Err(e) => response.reject(request.id, e.to_string()),
            }
        }

        self.into_subsets(accepted, |s, r| DeletionWorkingSubset::new(s, r), &mut response);
        response
    }

    fn prepare_for_restoration(
        &self,
        requests: Vec<FileCacheRequest>,
    ) -> PreparationResponse<RestorationWorkingSubset> {
        // Online/offline local storage has no restore step.
        let mut response = PreparationResponse::new();
        for request in requests {
            response.reject(
                request.id,
                format!("restoration is not supported by {} storage", self.kind),
            );
        }
        response
    }

    async fn store(
        &self,
        subset: StorageWorkingSubset,
        progress: Arc<dyn StorageProgress>,
    ) -> StorageResult<()> {
        for request in subset.into_requests() {
            match self.store_one(&request).await {
                Ok((url, size)) => progress.storage_succeeded(&request, &url, size).await,
                Err(e) => {
                    tracing::warn!(
                        storage = %self.name,
                        checksum = %request.checksum,
                        error = %e,
                        "Local storage store failed"
                    );
                    progress.storage_failed(&request, &e.to_string()).await;
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
            let path = match self.owned_path(&request.file_url) {
                Ok(path) => path,
                Err(e) => {
                    progress.deletion_failed(&request, &e.to_string()).await;
                    continue;
                }
            };

            if !fs::try_exists(&path).await.unwrap_or(false) {
                // Already gone; deletion is idempotent.
                progress.deletion_succeeded(&request).await;
                continue;
            }

            match fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::info!(
                        storage = %self.name,
                        checksum = %request.checksum,
                        path = %path.display(),
                        "Local storage delete successful"
                    );
                    progress.deletion_succeeded(&request).await;
                }
                Err(e) => {
                    progress
                        .deletion_failed(
                            &request,
                            &format!("failed to delete {}: {}", path.display(), e),
                        )
                        .await;
                }
            }
        }
        Ok(())
    }

    fn validate_url(&self, url: &str, errors: &mut Vec<String>) -> bool {
        match self.owned_path(url) {
            Ok(_) => true,
            Err(e) => {
                errors.push(e.to_string());
                false
            }
        }
    }

    fn allows_physical_deletion(&self) -> bool {
        true
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use crate::digest::sha256_hex;
    use crate::subset::WorkingSubset;
    use crate::test_support::{RecordingDeletionProgress, RecordingStorageProgress};
    use serde_json::json;
    use tempfile::tempdir;

    fn online_local(root: &Path) -> LocalStorage {
        let conf = StorageLocationConfiguration::new(
            "disk-1",
            StorageKind::Online,
            "local",
            json!({ "root": root.display().to_string() }),
        );
        LocalStorage::from_configuration(&conf).unwrap()
    }

    async fn write_source(dir: &Path, name: &str, data: &[u8]) -> FileStorageRequest {
        let path = dir.join(name);
        fs::write(&path, data).await.unwrap();
        FileStorageRequest::new(
            sha256_hex(data),
            "sha256",
            name,
            "application/octet-stream",
            urls::path_to_file_url(&path),
            Some("disk-1".to_string()),
            None,
        )
    }

    #[tokio::test]
    async fn store_then_delete_roundtrip() {
        let sources = tempdir().unwrap();
        let root = tempdir().unwrap();
        let storage = online_local(root.path());

        let request = write_source(sources.path(), "data.bin", b"tiered bytes").await;
        let checksum = request.checksum.clone();

        let response = storage.prepare_for_storage(vec![request]);
        assert_eq!(response.working_subsets().len(), 1);
        assert!(response.rejected().is_empty());

        let progress = Arc::new(RecordingStorageProgress::default());
        let subset = response.working_subsets()[0].clone();
        storage.store(subset, progress.clone()).await.unwrap();

        let succeeded = progress.succeeded.lock().unwrap().clone();
        assert_eq!(succeeded.len(), 1);
        let (_, url, size) = &succeeded[0];
        assert_eq!(*size, b"tiered bytes".len() as i64);
        assert!(fs::try_exists(root.path().join(&checksum)).await.unwrap());

        let deletion = FileDeletionRequest::new(&checksum, "disk-1", url.clone());
        let response = storage.prepare_for_deletion(vec![deletion]);
        let del_progress = Arc::new(RecordingDeletionProgress::default());
        storage
            .delete(response.working_subsets()[0].clone(), del_progress.clone())
            .await
            .unwrap();

        assert_eq!(del_progress.succeeded.lock().unwrap().len(), 1);
        assert!(!fs::try_exists(root.path().join(&checksum)).await.unwrap());
    }

    #[tokio::test]
    async fn checksum_mismatch_reports_failure() {
        let sources = tempdir().unwrap();
        let root = tempdir().unwrap();
        let storage = online_local(root.path());

        let mut request = write_source(sources.path(), "data.bin", b"actual content").await;
        request.checksum = sha256_hex(b"different content");

        let response = storage.prepare_for_storage(vec![request]);
        let progress = Arc::new(RecordingStorageProgress::default());
        storage
            .store(response.working_subsets()[0].clone(), progress.clone())
            .await
            .unwrap();

        let failed = progress.failed.lock().unwrap().clone();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].1.contains("checksum mismatch"));
        assert!(progress.succeeded.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn prepare_rejects_foreign_origin_scheme() {
        let root = tempdir().unwrap();
        let storage = online_local(root.path());

        let request = FileStorageRequest::new(
            "abc",
            "sha256",
            "data.bin",
            "application/octet-stream",
            "https://example.com/data.bin",
            Some("disk-1".to_string()),
            None,
        );
        let id = request.id;

        let response = storage.prepare_for_storage(vec![request]);
        assert!(response.working_subsets().is_empty());
        assert!(response.rejected()[&id].contains("origin URL"));
    }

    #[tokio::test]
    async fn prepare_groups_by_subdirectory_and_caps_subset_size() {
        let sources = tempdir().unwrap();
        let root = tempdir().unwrap();
        let conf = StorageLocationConfiguration::new(
            "disk-1",
            StorageKind::Online,
            "local",
            json!({ "root": root.path().display().to_string(), "subset_max_size": 2 }),
        );
        let storage = LocalStorage::from_configuration(&conf).unwrap();

        let mut requests = Vec::new();
        for i in 0..5 {
            let mut request =
                write_source(sources.path(), &format!("f{}.bin", i), format!("data{}", i).as_bytes())
                    .await;
            request.subdirectory = Some("batch-a".to_string());
            requests.push(request);
        }

        let response = storage.prepare_for_storage(requests);
        assert!(response.rejected().is_empty());
        assert_eq!(response.working_subsets().len(), 3);
        let total: usize = response.working_subsets().iter().map(|s| s.len()).sum();
        assert_eq!(total, 5);
    }

    #[tokio::test]
    async fn restoration_is_rejected_per_request() {
        let root = tempdir().unwrap();
        let storage = online_local(root.path());

        let request = FileCacheRequest::new(
            "abc",
            "disk-1",
            "file:///somewhere/abc",
            "data.bin",
            "application/octet-stream",
            4,
            "/tmp/cache",
        );
        let id = request.id;

        let response = storage.prepare_for_restoration(vec![request]);
        assert!(response.working_subsets().is_empty());
        assert!(response.rejected()[&id].contains("not supported"));
    }

    #[tokio::test]
    async fn validate_url_rejects_paths_outside_root() {
        let root = tempdir().unwrap();
        let storage = online_local(root.path());

        let mut errors = Vec::new();
        assert!(!storage.validate_url("file:///etc/passwd", &mut errors));
        assert_eq!(errors.len(), 1);

        let mut errors = Vec::new();
        let inside = urls::path_to_file_url(&root.path().join("abc"));
        assert!(storage.validate_url(&inside, &mut errors));
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn delete_missing_file_succeeds() {
        let root = tempdir().unwrap();
        let storage = online_local(root.path());

        let url = urls::path_to_file_url(&root.path().join("missing"));
        let request = FileDeletionRequest::new("missing", "disk-1", url);
        let response = storage.prepare_for_deletion(vec![request]);

        let progress = Arc::new(RecordingDeletionProgress::default());
        storage
            .delete(response.working_subsets()[0].clone(), progress.clone())
            .await
            .unwrap();
        assert_eq!(progress.succeeded.lock().unwrap().len(), 1);
    }
}
