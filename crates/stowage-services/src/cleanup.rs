//! Periodic purge of expired cache ledger entries.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;

use stowage_core::models::CacheLocation;
use stowage_db::CacheFileRepository;

/// Removes expired cache ledger entries and their internal disk files.
///
/// Expiry is also enforced lazily at query time by the availability and
/// download services; this sweep keeps the ledger and the disk cache from
/// accumulating dead entries nobody asks about.
#[derive(Clone)]
pub struct CacheCleanupService {
    cache_files: Arc<dyn CacheFileRepository>,
    interval_secs: u64,
}

impl CacheCleanupService {
    pub fn new(cache_files: Arc<dyn CacheFileRepository>, interval_secs: u64) -> Self {
        Self {
            cache_files,
            interval_secs,
        }
    }

    /// Start the background cleanup task.
    /// Returns a JoinHandle for graceful shutdown.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut cleanup_interval = interval(Duration::from_secs(self.interval_secs));

            loop {
                cleanup_interval.tick().await;

                tracing::info!("Starting scheduled purge of expired cache entries");

                match self.purge_expired().await {
                    Ok(count) => {
                        tracing::info!(count, "Cache purge completed");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Cache purge failed");
                    }
                }
            }
        })
    }

    /// Purge every expired cache entry, returning how many were removed.
    #[tracing::instrument(skip(self))]
    pub async fn purge_expired(&self) -> Result<usize, anyhow::Error> {
        let expired = self.cache_files.find_expired(Utc::now()).await?;
        let count = expired.len();

        for entry in expired {
            if let CacheLocation::Internal { path } = &entry.location {
                match tokio::fs::remove_file(path).await {
                    Ok(()) => {
                        tracing::debug!(checksum = %entry.checksum, path = %path, "Removed expired cache file");
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            checksum = %entry.checksum,
                            path = %path,
                            "Failed to remove cache file from disk, continuing with ledger deletion"
                        );
                    }
                }
            }

            if let Err(e) = self.cache_files.delete_by_checksum(&entry.checksum).await {
                tracing::error!(
                    error = %e,
                    checksum = %entry.checksum,
                    "Failed to delete expired cache entry"
                );
            }
        }

        Ok(count)
    }
}
