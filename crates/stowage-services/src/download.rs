//! Download orchestrator: cache-first byte streams for one checksum.
//!
//! The cache ledger is consulted first; internal entries stream local bytes,
//! external entries delegate to the nearline backend's direct-download
//! capability. A not-available failure invalidates the (stale) ledger entry;
//! a transient download failure retains it for retry.

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tokio::fs;

use stowage_core::models::{CacheFile, CacheLocation};
use stowage_db::{CacheFileRepository, FileReferenceRepository};
use stowage_storage::{DownloadStream, StorageError, StorageResult};

use crate::resolver::BackendResolver;

/// A served download: the ledger entry it came from plus the byte stream.
pub struct FileDownload {
    pub cache_file: CacheFile,
    pub stream: DownloadStream,
}

/// Serves byte streams for cached checksums.
pub struct DownloadService {
    file_references: Arc<dyn FileReferenceRepository>,
    cache_files: Arc<dyn CacheFileRepository>,
    resolver: Arc<BackendResolver>,
}

impl DownloadService {
    pub fn new(
        file_references: Arc<dyn FileReferenceRepository>,
        cache_files: Arc<dyn CacheFileRepository>,
        resolver: Arc<BackendResolver>,
    ) -> Self {
        Self {
            file_references,
            cache_files,
            resolver,
        }
    }

    /// Serve the file behind `checksum` from its fast-access copy.
    ///
    /// Fails [`StorageError::NotAvailable`] when no usable cache copy exists
    /// (a restoration request must be issued first) and
    /// [`StorageError::DownloadFailed`] on transient errors worth retrying.
    #[tracing::instrument(skip(self))]
    pub async fn download(&self, checksum: &str) -> StorageResult<FileDownload> {
        let entry = self
            .cache_files
            .find_by_checksum(checksum)
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        let Some(entry) = entry else {
            return Err(StorageError::NotAvailable(format!(
                "no cache copy of {}; restoration required",
                checksum
            )));
        };

        if entry.is_expired(Utc::now()) {
            self.discard_entry(checksum).await;
            return Err(StorageError::NotAvailable(format!(
                "cache copy of {} expired",
                checksum
            )));
        }

        match entry.location.clone() {
            CacheLocation::Internal { path } => self.download_internal(entry, &path).await,
            CacheLocation::External { storage } => self.download_external(entry, &storage).await,
        }
    }

    async fn download_internal(
        &self,
        entry: CacheFile,
        path: &str,
    ) -> StorageResult<FileDownload> {
        let file = match fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // The disk cache evicted the file underneath the ledger.
                self.discard_entry(&entry.checksum).await;
                return Err(StorageError::NotAvailable(format!(
                    "internal cache copy of {} is gone",
                    entry.checksum
                )));
            }
            Err(e) => {
                return Err(StorageError::DownloadFailed(format!(
                    "failed to open {}: {}",
                    path, e
                )));
            }
        };

        tracing::debug!(
            checksum = %entry.checksum,
            path = %path,
            "Serving download from internal cache"
        );

        let stream = tokio_util::io::ReaderStream::new(file).map(|result| {
            result.map_err(|e| StorageError::DownloadFailed(format!("failed to read chunk: {}", e)))
        });
        Ok(FileDownload {
            cache_file: entry,
            stream: Box::pin(stream),
        })
    }

    async fn download_external(
        &self,
        entry: CacheFile,
        storage: &str,
    ) -> StorageResult<FileDownload> {
        let reference = self
            .file_references
            .find_by_storage_and_checksum(storage, &entry.checksum)
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        let Some(reference) = reference else {
            // The stored copy is gone; the ledger entry is stale.
            self.discard_entry(&entry.checksum).await;
            return Err(StorageError::NotAvailable(format!(
                "no file reference for {} on {}",
                entry.checksum, storage
            )));
        };

        let backend = self
            .resolver
            .resolve(storage)
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        match backend.download(&reference).await {
            Ok(stream) => {
                tracing::debug!(
                    checksum = %entry.checksum,
                    storage = %storage,
                    "Serving download from external cache"
                );
                Ok(FileDownload {
                    cache_file: entry,
                    stream,
                })
            }
            Err(StorageError::NotAvailable(message)) => {
                // The backend's fast tier evicted the copy since the entry
                // was written: the entry is stale.
                self.discard_entry(&entry.checksum).await;
                Err(StorageError::NotAvailable(message))
            }
            Err(e) => {
                // Transient failure: the copy is presumed still cached, the
                // entry is retained for retry.
                tracing::warn!(
                    error = %e,
                    checksum = %entry.checksum,
                    storage = %storage,
                    "External download failed, cache entry retained"
                );
                Err(StorageError::DownloadFailed(e.to_string()))
            }
        }
    }

    async fn discard_entry(&self, checksum: &str) {
        if let Err(e) = self.cache_files.delete_by_checksum(checksum).await {
            tracing::error!(error = %e, checksum = %checksum, "Failed to discard stale cache entry");
        }
    }
}
