//! Two-tier nearline filesystem backend.
//!
//! Files live in a flat, checksum-addressed archive tier; a staging tier
//! holds the copies that are currently retrievable without a restore.
//! Freshly stored files are written through to staging and age out of it
//! (`restore_ttl_hours` past their staging mtime); `retrieve` copies archive
//! bytes into the caller's internal disk cache.
//!
//! With `write_behind` enabled, `store` parks the bytes in a spool directory
//! and reports success with a pending action; `run_periodic_action` flushes
//! the spool into the archive and settles the pending flags.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::StreamExt;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use stowage_core::models::{
    FileCacheRequest, FileDeletionRequest, FileReference, FileStorageRequest,
    StorageLocationConfiguration,
};
use stowage_core::StorageKind;

use crate::digest::verify_checksum;
use crate::progress::{
    DeletionProgress, PendingActionProgress, RestorationProgress, StorageProgress,
};
use crate::subset::{
    DeletionWorkingSubset, PreparationResponse, RestorationWorkingSubset, StorageWorkingSubset,
};
use crate::traits::{Availability, DownloadStream, StorageBackend, StorageError, StorageResult};
use crate::urls;

const DEFAULT_RESTORE_TTL_HOURS: i64 = 24;
const DEFAULT_SUBSET_MAX_SIZE: usize = 100;
const SPOOL_DIR: &str = ".spool";

fn default_restore_ttl_hours() -> i64 {
    DEFAULT_RESTORE_TTL_HOURS
}

fn default_subset_max_size() -> usize {
    DEFAULT_SUBSET_MAX_SIZE
}

fn default_allow_physical_deletion() -> bool {
    true
}

/// Backend-specific configuration for [`StagedStorage`].
#[derive(Debug, Clone, Deserialize)]
pub struct StagedStorageConfig {
    /// Slow tier: every stored file ends up here.
    pub archive_root: String,
    /// Fast tier: copies retrievable without a restore.
    pub staging_root: String,
    /// Hours a staging copy stays retrievable past its mtime.
    #[serde(default = "default_restore_ttl_hours")]
    pub restore_ttl_hours: i64,
    /// Park stored bytes in a spool and archive them from the periodic
    /// action, reporting a pending action on store.
    #[serde(default)]
    pub write_behind: bool,
    #[serde(default = "default_allow_physical_deletion")]
    pub allow_physical_deletion: bool,
    #[serde(default = "default_subset_max_size")]
    pub subset_max_size: usize,
}

impl StagedStorageConfig {
    /// Parse and validate the configuration payload. Pure.
    pub fn parse(value: &serde_json::Value) -> StorageResult<Self> {
        let config: StagedStorageConfig = serde_json::from_value(value.clone()).map_err(|e| {
            StorageError::ConfigError(format!("invalid staged storage configuration: {}", e))
        })?;
        if config.archive_root.is_empty() || config.staging_root.is_empty() {
            return Err(StorageError::ConfigError(
                "staged storage roots must not be empty".to_string(),
            ));
        }
        if config.restore_ttl_hours < 0 {
            return Err(StorageError::ConfigError(
                "restore_ttl_hours must not be negative".to_string(),
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

/// Nearline two-tier filesystem backend.
#[derive(Clone)]
pub struct StagedStorage {
    name: String,
    archive_root: PathBuf,
    staging_root: PathBuf,
    restore_ttl_hours: i64,
    write_behind: bool,
    allow_physical_deletion: bool,
    subset_max_size: usize,
}

impl StagedStorage {
    pub fn from_configuration(conf: &StorageLocationConfiguration) -> StorageResult<Self> {
        let config = StagedStorageConfig::parse(&conf.configuration)?;
        if conf.kind != StorageKind::Nearline {
            return Err(StorageError::ConfigError(format!(
                "staged backend only serves nearline locations, {} is {}",
                conf.name, conf.kind
            )));
        }
        Ok(Self {
            name: conf.name.clone(),
            archive_root: PathBuf::from(config.archive_root),
            staging_root: PathBuf::from(config.staging_root),
            restore_ttl_hours: config.restore_ttl_hours,
            write_behind: config.write_behind,
            allow_physical_deletion: config.allow_physical_deletion,
            subset_max_size: config.subset_max_size,
        })
    }

    fn archive_path(&self, checksum: &str) -> PathBuf {
        self.archive_root.join(checksum)
    }

    fn staging_path(&self, checksum: &str) -> PathBuf {
        self.staging_root.join(checksum)
    }

    fn spool_path(&self, checksum: &str) -> PathBuf {
        self.archive_root.join(SPOOL_DIR).join(checksum)
    }

    /// Expiration of a staging copy, derived from its mtime.
    fn staging_expiration(&self, modified: std::time::SystemTime) -> DateTime<Utc> {
        DateTime::<Utc>::from(modified) + Duration::hours(self.restore_ttl_hours)
    }

    async fn write_file(path: &Path, data: &[u8]) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(path).await.map_err(|e| {
            StorageError::StoreFailed(format!("failed to create file {}: {}", path.display(), e))
        })?;
        file.write_all(data).await.map_err(|e| {
            StorageError::StoreFailed(format!("failed to write file {}: {}", path.display(), e))
        })?;
        file.sync_all().await.map_err(|e| {
            StorageError::StoreFailed(format!("failed to sync file {}: {}", path.display(), e))
        })?;
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

        let archive = self.archive_path(&request.checksum);
        let size = data.len() as i64;

        if self.write_behind {
            Self::write_file(&self.spool_path(&request.checksum), &data).await?;
        } else {
            Self::write_file(&archive, &data).await?;
        }
        // Freshly stored files are hot: write through to the fast tier.
        Self::write_file(&self.staging_path(&request.checksum), &data).await?;

        tracing::info!(
            storage = %self.name,
            checksum = %request.checksum,
            size_bytes = size,
            write_behind = self.write_behind,
            "Staged storage store successful"
        );

        Ok((urls::path_to_file_url(&archive), size))
    }

    /// Remove a file, treating "already gone" as success.
    async fn remove_if_present(path: &Path) -> StorageResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn chunked<R, S>(
        &self,
        accepted: Vec<R>,
        make: impl Fn(String, Vec<R>) -> S,
        response: &mut PreparationResponse<S>,
    ) {
        let mut iter = accepted.into_iter().peekable();
        while iter.peek().is_some() {
            let chunk: Vec<R> = iter.by_ref().take(self.subset_max_size).collect();
            response.add_working_subset(make(self.name.clone(), chunk));
        }
    }
}

#[async_trait]
impl StorageBackend for StagedStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StorageKind {
        StorageKind::Nearline
    }

    fn prepare_for_storage(
        &self,
        requests: Vec<FileStorageRequest>,
    ) -> PreparationResponse<StorageWorkingSubset> {
        let mut response = PreparationResponse::new();
        let mut accepted = Vec::new();
        for request in requests {
            match urls::file_url_to_path(&request.origin_url) {
                Ok(_) => accepted.push(request),
                Err(e) => response.reject(request.id, format!("unreadable origin URL: {}", e)),
            }
        }
        self.chunked(accepted, |s, r| StorageWorkingSubset::new(s, r), &mut response);
        response
    }

    fn prepare_for_deletion(
        &self,
        requests: Vec<FileDeletionRequest>,
    ) -> PreparationResponse<DeletionWorkingSubset> {
        let mut response = PreparationResponse::new();
        let mut accepted = Vec::new();
        for request in requests {
            match urls::file_url_to_path(&request.file_url) {
                Ok(path) if path.starts_with(&self.archive_root) => accepted.push(request),
                Ok(path) => response.reject(
                    request.id,
                    format!(
                        "URL {} is outside archive root {}",
                        path.display(),
                        self.archive_root.display()
                    ),
                ),
                Err(e) => response.reject(request.id, e.to_string()),
            }
        }
        self.chunked(accepted, |s, r| DeletionWorkingSubset::new(s, r), &mut response);
        response
    }

    fn prepare_for_restoration(
        &self,
        requests: Vec<FileCacheRequest>,
    ) -> PreparationResponse<RestorationWorkingSubset> {
        let mut response = PreparationResponse::new();
        let mut accepted = Vec::new();
        for request in requests {
            if request.destination_path.is_empty() {
                response.reject(request.id, "restoration destination path is empty");
                continue;
            }
            match urls::file_url_to_path(&request.file_url) {
                Ok(_) => accepted.push(request),
                Err(e) => response.reject(request.id, e.to_string()),
            }
        }
        self.chunked(
            accepted,
            |s, r| RestorationWorkingSubset::new(s, r),
            &mut response,
        );
        response
    }

    async fn store(
        &self,
        subset: StorageWorkingSubset,
        progress: Arc<dyn StorageProgress>,
    ) -> StorageResult<()> {
        for request in subset.into_requests() {
            match self.store_one(&request).await {
                Ok((url, size)) if self.write_behind => {
                    progress
                        .storage_succeeded_with_pending_action(&request, &url, size, false)
                        .await;
                }
                Ok((url, size)) => progress.storage_succeeded(&request, &url, size).await,
                Err(e) => {
                    tracing::warn!(
                        storage = %self.name,
                        checksum = %request.checksum,
                        error = %e,
                        "Staged storage store failed"
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
            let result = async {
                Self::remove_if_present(&self.archive_path(&request.checksum)).await?;
                Self::remove_if_present(&self.staging_path(&request.checksum)).await?;
                Self::remove_if_present(&self.spool_path(&request.checksum)).await
            }
            .await;

            match result {
                Ok(()) => {
                    tracing::info!(
                        storage = %self.name,
                        checksum = %request.checksum,
                        "Staged storage delete successful"
                    );
                    progress.deletion_succeeded(&request).await;
                }
                Err(e) => progress.deletion_failed(&request, &e.to_string()).await,
            }
        }
        Ok(())
    }

    async fn retrieve(
        &self,
        subset: RestorationWorkingSubset,
        progress: Arc<dyn RestorationProgress>,
    ) -> StorageResult<()> {
        for request in subset.into_requests() {
            let result = async {
                let mut source = self.archive_path(&request.checksum);
                if !fs::try_exists(&source).await.unwrap_or(false) {
                    // Not yet flushed from the spool.
                    source = self.spool_path(&request.checksum);
                }

                let destination = Path::new(&request.destination_path).join(&request.checksum);
                if let Some(parent) = destination.parent() {
                    fs::create_dir_all(parent).await?;
                }
                let copied = fs::copy(&source, &destination).await.map_err(|e| {
                    StorageError::RestorationFailed(format!(
                        "failed to copy {} to {}: {}",
                        source.display(),
                        destination.display(),
                        e
                    ))
                })?;
                Ok::<_, StorageError>((destination, copied as i64))
            }
            .await;

            match result {
                Ok((destination, size)) => {
                    let expiration = Utc::now() + Duration::hours(self.restore_ttl_hours);
                    tracing::info!(
                        storage = %self.name,
                        checksum = %request.checksum,
                        path = %destination.display(),
                        size_bytes = size,
                        "Staged storage restoration successful"
                    );
                    progress
                        .restoration_succeeded(&request, &destination, size, expiration)
                        .await;
                }
                Err(e) => progress.restoration_failed(&request, &e.to_string()).await,
            }
        }
        Ok(())
    }

    async fn check_availability(&self, reference: &FileReference) -> StorageResult<Availability> {
        let staging = self.staging_path(&reference.checksum);

        let metadata = match fs::metadata(&staging).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Availability::unavailable("not present in fast tier"));
            }
            Err(e) => {
                return Err(StorageError::AvailabilityCheck(format!(
                    "failed to stat {}: {}",
                    staging.display(),
                    e
                )));
            }
        };

        let modified = metadata.modified().map_err(|e| {
            StorageError::AvailabilityCheck(format!(
                "failed to read mtime of {}: {}",
                staging.display(),
                e
            ))
        })?;
        let expiration = self.staging_expiration(modified);

        if expiration <= Utc::now() {
            // Evict the stale fast-tier copy.
            let _ = fs::remove_file(&staging).await;
            return Ok(Availability::unavailable("fast tier copy expired"));
        }

        Ok(Availability::available(
            Some(expiration),
            "present in fast tier",
        ))
    }

    async fn download(&self, reference: &FileReference) -> StorageResult<DownloadStream> {
        let staging = self.staging_path(&reference.checksum);

        match fs::metadata(&staging).await {
            Ok(metadata) => {
                if let Ok(modified) = metadata.modified() {
                    if self.staging_expiration(modified) <= Utc::now() {
                        let _ = fs::remove_file(&staging).await;
                        return Err(StorageError::NotAvailable(format!(
                            "fast tier copy of {} expired",
                            reference.checksum
                        )));
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotAvailable(format!(
                    "no fast tier copy of {}",
                    reference.checksum
                )));
            }
            Err(e) => {
                return Err(StorageError::DownloadFailed(format!(
                    "failed to stat {}: {}",
                    staging.display(),
                    e
                )));
            }
        }

        let file = fs::File::open(&staging).await.map_err(|e| {
            StorageError::DownloadFailed(format!("failed to open {}: {}", staging.display(), e))
        })?;

        let stream = tokio_util::io::ReaderStream::new(file).map(|result| {
            result.map_err(|e| StorageError::DownloadFailed(format!("failed to read chunk: {}", e)))
        });

        Ok(Box::pin(stream))
    }

    async fn run_periodic_action(
        &self,
        progress: Arc<dyn PendingActionProgress>,
    ) -> StorageResult<()> {
        if !self.write_behind {
            return Ok(());
        }

        let spool_dir = self.archive_root.join(SPOOL_DIR);
        let mut entries = match fs::read_dir(&spool_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(StorageError::BackendError(format!(
                    "failed to scan spool {}: {}",
                    spool_dir.display(),
                    e
                )));
            }
        };

        let mut flushed = 0usize;
        let mut failures = 0usize;
        while let Some(entry) = entries.next_entry().await.map_err(StorageError::IoError)? {
            let checksum = entry.file_name().to_string_lossy().to_string();
            let destination = self.archive_path(&checksum);
            match fs::rename(entry.path(), &destination).await {
                Ok(()) => {
                    flushed += 1;
                    progress.pending_action_succeeded(&self.name, &checksum).await;
                }
                Err(e) => {
                    failures += 1;
                    progress
                        .pending_action_failed(
                            &self.name,
                            &checksum,
                            &format!("failed to archive spooled file: {}", e),
                        )
                        .await;
                }
            }
        }

        if flushed > 0 || failures > 0 {
            tracing::info!(
                storage = %self.name,
                flushed,
                failures,
                "Staged storage spool flush completed"
            );
        }
        Ok(())
    }

    fn validate_url(&self, url: &str, errors: &mut Vec<String>) -> bool {
        match urls::file_url_to_path(url) {
            Ok(path) if path.starts_with(&self.archive_root) => true,
            Ok(path) => {
                errors.push(format!(
                    "URL {} is outside archive root {}",
                    path.display(),
                    self.archive_root.display()
                ));
                false
            }
            Err(e) => {
                errors.push(e.to_string());
                false
            }
        }
    }

    fn allows_physical_deletion(&self) -> bool {
        self.allow_physical_deletion
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use crate::test_support::{
        RecordingDeletionProgress, RecordingPendingActionProgress, RecordingRestorationProgress,
        RecordingStorageProgress,
    };
    use crate::digest::sha256_hex;
    use serde_json::json;
    use stowage_core::models::FileLocation;
    use tempfile::tempdir;

    fn nearline(archive: &Path, staging: &Path, extra: serde_json::Value) -> StagedStorage {
        let mut configuration = json!({
            "archive_root": archive.display().to_string(),
            "staging_root": staging.display().to_string(),
        });
        if let (Some(base), Some(extra)) = (configuration.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        let conf = StorageLocationConfiguration::new(
            "tier-2",
            StorageKind::Nearline,
            "staged",
            configuration,
        );
        StagedStorage::from_configuration(&conf).unwrap()
    }

    async fn store_file(storage: &StagedStorage, dir: &Path, data: &[u8]) -> FileReference {
        let source = dir.join("src.bin");
        fs::write(&source, data).await.unwrap();
        let request = FileStorageRequest::new(
            sha256_hex(data),
            "sha256",
            "src.bin",
            "application/octet-stream",
            urls::path_to_file_url(&source),
            Some("tier-2".to_string()),
            None,
        );

        let response = storage.prepare_for_storage(vec![request]);
        let progress = Arc::new(RecordingStorageProgress::default());
        storage
            .store(response.working_subsets()[0].clone(), progress.clone())
            .await
            .unwrap();

        let succeeded = progress.succeeded.lock().unwrap().clone();
        let pending = progress.pending.lock().unwrap().clone();
        let (url, size) = if let Some((_, url, size)) = succeeded.first() {
            (url.clone(), *size)
        } else {
            let (_, url, size, _) = pending.first().expect("store reported no outcome").clone();
            (url, size)
        };

        FileReference::new(
            sha256_hex(data),
            "sha256",
            "src.bin",
            "application/octet-stream",
            size,
            FileLocation::new("tier-2", url),
        )
    }

    #[tokio::test]
    async fn store_writes_through_to_fast_tier() {
        let (archive, staging, sources) = (tempdir().unwrap(), tempdir().unwrap(), tempdir().unwrap());
        let storage = nearline(archive.path(), staging.path(), json!({}));

        let reference = store_file(&storage, sources.path(), b"hot bytes").await;

        assert!(fs::try_exists(archive.path().join(&reference.checksum))
            .await
            .unwrap());
        assert!(fs::try_exists(staging.path().join(&reference.checksum))
            .await
            .unwrap());

        let availability = storage.check_availability(&reference).await.unwrap();
        assert!(availability.available);
        assert!(availability.expiration_date.is_some());
    }

    #[tokio::test]
    async fn eviction_makes_file_unavailable() {
        let (archive, staging, sources) = (tempdir().unwrap(), tempdir().unwrap(), tempdir().unwrap());
        let storage = nearline(archive.path(), staging.path(), json!({}));

        let reference = store_file(&storage, sources.path(), b"cold bytes").await;
        fs::remove_file(staging.path().join(&reference.checksum))
            .await
            .unwrap();

        let availability = storage.check_availability(&reference).await.unwrap();
        assert!(!availability.available);
        assert!(availability.expiration_date.is_none());
    }

    #[tokio::test]
    async fn expired_staging_copy_is_evicted_on_check() {
        let (archive, staging, sources) = (tempdir().unwrap(), tempdir().unwrap(), tempdir().unwrap());
        let storage = nearline(
            archive.path(),
            staging.path(),
            json!({ "restore_ttl_hours": 0 }),
        );

        let reference = store_file(&storage, sources.path(), b"stale bytes").await;

        let availability = storage.check_availability(&reference).await.unwrap();
        assert!(!availability.available);
        assert!(!fs::try_exists(staging.path().join(&reference.checksum))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn download_serves_fast_tier_bytes() {
        let (archive, staging, sources) = (tempdir().unwrap(), tempdir().unwrap(), tempdir().unwrap());
        let storage = nearline(archive.path(), staging.path(), json!({}));

        let reference = store_file(&storage, sources.path(), b"downloadable").await;

        let mut stream = storage.download(&reference).await.unwrap();
        let mut bytes = Vec::new();
        while let Some(chunk) = stream.next().await {
            bytes.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(bytes, b"downloadable");

        fs::remove_file(staging.path().join(&reference.checksum))
            .await
            .unwrap();
        let result = storage.download(&reference).await;
        assert!(matches!(result, Err(StorageError::NotAvailable(_))));
    }

    #[tokio::test]
    async fn retrieve_restores_into_destination_cache() {
        let (archive, staging, sources) = (tempdir().unwrap(), tempdir().unwrap(), tempdir().unwrap());
        let cache = tempdir().unwrap();
        let storage = nearline(archive.path(), staging.path(), json!({}));

        let reference = store_file(&storage, sources.path(), b"restorable").await;

        let request = FileCacheRequest::new(
            reference.checksum.clone(),
            "tier-2",
            reference.location.url.clone(),
            "src.bin",
            "application/octet-stream",
            reference.file_size,
            cache.path().display().to_string(),
        );

        let response = storage.prepare_for_restoration(vec![request]);
        let progress = Arc::new(RecordingRestorationProgress::default());
        storage
            .retrieve(response.working_subsets()[0].clone(), progress.clone())
            .await
            .unwrap();

        let succeeded = progress.succeeded.lock().unwrap().clone();
        assert_eq!(succeeded.len(), 1);
        let (_, restored_path, size, expiration) = &succeeded[0];
        assert_eq!(*size, b"restorable".len() as i64);
        assert!(*expiration > Utc::now());
        assert!(fs::try_exists(restored_path).await.unwrap());
    }

    #[tokio::test]
    async fn write_behind_reports_pending_then_periodic_action_settles() {
        let (archive, staging, sources) = (tempdir().unwrap(), tempdir().unwrap(), tempdir().unwrap());
        let storage = nearline(
            archive.path(),
            staging.path(),
            json!({ "write_behind": true }),
        );

        let reference = store_file(&storage, sources.path(), b"spooled bytes").await;

        // Bytes are parked in the spool, not yet archived.
        assert!(!fs::try_exists(archive.path().join(&reference.checksum))
            .await
            .unwrap());
        assert!(
            fs::try_exists(archive.path().join(SPOOL_DIR).join(&reference.checksum))
                .await
                .unwrap()
        );

        let progress = Arc::new(RecordingPendingActionProgress::default());
        storage.run_periodic_action(progress.clone()).await.unwrap();

        let succeeded = progress.succeeded.lock().unwrap().clone();
        assert_eq!(
            succeeded,
            vec![("tier-2".to_string(), reference.checksum.clone())]
        );
        assert!(fs::try_exists(archive.path().join(&reference.checksum))
            .await
            .unwrap());
        assert!(
            !fs::try_exists(archive.path().join(SPOOL_DIR).join(&reference.checksum))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn delete_removes_both_tiers() {
        let (archive, staging, sources) = (tempdir().unwrap(), tempdir().unwrap(), tempdir().unwrap());
        let storage = nearline(archive.path(), staging.path(), json!({}));

        let reference = store_file(&storage, sources.path(), b"deletable").await;

        let request = FileDeletionRequest::new(
            reference.checksum.clone(),
            "tier-2",
            reference.location.url.clone(),
        );
        let response = storage.prepare_for_deletion(vec![request]);
        let progress = Arc::new(RecordingDeletionProgress::default());
        storage
            .delete(response.working_subsets()[0].clone(), progress.clone())
            .await
            .unwrap();

        assert_eq!(progress.succeeded.lock().unwrap().len(), 1);
        assert!(!fs::try_exists(archive.path().join(&reference.checksum))
            .await
            .unwrap());
        assert!(!fs::try_exists(staging.path().join(&reference.checksum))
            .await
            .unwrap());
    }
}
