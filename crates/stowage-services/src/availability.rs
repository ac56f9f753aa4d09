//! Nearline availability and confirmation cache.
//!
//! Answers "is checksum X available for immediate download" for a batch of
//! checksums while minimizing calls to the expensive nearline
//! `check_availability` operation.
//!
//! A *negative* backend answer is durable information and is remembered on
//! the file reference (`nearline_confirmed`), short-circuiting every later
//! check. A *positive* answer is never cached as a skip-condition (the fast
//! tier may evict at any moment); it only creates/refreshes an external
//! cache ledger entry. An error or timeout is fail-safe not-available and
//! never flips the confirmation flag.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use futures::future::join_all;

use stowage_core::models::{CacheFile, FileAvailability, FileReference};
use stowage_core::{AppError, Config, StorageKind};
use stowage_db::{CacheFileRepository, FileReferenceRepository};
use stowage_storage::StorageError;

use crate::resolver::BackendResolver;

/// Batch availability queries over the cache ledger, the tier configuration,
/// and the nearline backends.
pub struct AvailabilityService {
    file_references: Arc<dyn FileReferenceRepository>,
    cache_files: Arc<dyn CacheFileRepository>,
    resolver: Arc<BackendResolver>,
    availability_timeout: Duration,
    /// Fallback lifetime for external cache entries when the backend reports
    /// no expiration.
    external_cache_ttl: ChronoDuration,
}

impl AvailabilityService {
    pub fn new(
        file_references: Arc<dyn FileReferenceRepository>,
        cache_files: Arc<dyn CacheFileRepository>,
        resolver: Arc<BackendResolver>,
        config: &Config,
    ) -> Self {
        Self {
            file_references,
            cache_files,
            resolver,
            availability_timeout: Duration::from_secs(config.availability_timeout_secs),
            external_cache_ttl: ChronoDuration::hours(config.cache_expiration_hours),
        }
    }

    /// Availability of each checksum that resolves to a known file
    /// reference; unknown checksums are omitted, not errored.
    #[tracing::instrument(skip(self, checksums), fields(count = checksums.len()))]
    pub async fn check_availability(
        &self,
        checksums: &[String],
    ) -> Result<Vec<FileAvailability>, AppError> {
        let references = self.file_references.find_by_checksums(checksums).await?;
        let cache_entries = self.cache_files.find_by_checksums(checksums).await?;
        let now = Utc::now();

        let mut cached: HashMap<String, CacheFile> = HashMap::new();
        for entry in cache_entries {
            if entry.is_expired(now) {
                // Expired entries are treated as absent and purged lazily.
                if let Err(e) = self.cache_files.delete_by_checksum(&entry.checksum).await {
                    tracing::error!(error = %e, checksum = %entry.checksum, "Failed to purge expired cache entry");
                }
            } else {
                cached.insert(entry.checksum.clone(), entry);
            }
        }

        let mut refs_by_checksum: HashMap<String, Vec<FileReference>> = HashMap::new();
        for reference in references {
            refs_by_checksum
                .entry(reference.checksum.clone())
                .or_default()
                .push(reference);
        }

        // Tier of every storage location referenced in this batch.
        let mut kinds: HashMap<String, StorageKind> = HashMap::new();
        for refs in refs_by_checksum.values() {
            for reference in refs {
                let storage = &reference.location.storage;
                if kinds.contains_key(storage) {
                    continue;
                }
                match self.resolver.location(storage).await? {
                    Some(conf) => {
                        kinds.insert(storage.clone(), conf.kind);
                    }
                    None => {
                        tracing::warn!(
                            storage = %storage,
                            checksum = %reference.checksum,
                            "File reference points at unknown storage location"
                        );
                    }
                }
            }
        }

        let mut results = Vec::new();
        let mut to_query: Vec<(String, Vec<FileReference>)> = Vec::new();
        let mut seen = HashSet::new();

        for checksum in checksums {
            if !seen.insert(checksum.clone()) {
                continue;
            }
            let Some(refs) = refs_by_checksum.get(checksum) else {
                // No matching file reference: silently omitted.
                continue;
            };

            if let Some(entry) = cached.get(checksum) {
                results.push(FileAvailability::available(
                    checksum.as_str(),
                    Some(entry.expiration_date),
                ));
                continue;
            }

            let kind_of = |reference: &FileReference| kinds.get(&reference.location.storage).copied();

            if refs
                .iter()
                .any(|r| kind_of(r) == Some(StorageKind::Online))
            {
                results.push(FileAvailability::available(checksum.as_str(), None));
                continue;
            }

            let unconfirmed_nearline: Vec<FileReference> = refs
                .iter()
                .filter(|r| kind_of(r) == Some(StorageKind::Nearline) && !r.nearline_confirmed)
                .cloned()
                .collect();

            if unconfirmed_nearline.is_empty() {
                // Offline-only, or every nearline copy confirmed unavailable:
                // answered without a backend call.
                results.push(FileAvailability::unavailable(checksum.as_str()));
                continue;
            }

            to_query.push((checksum.clone(), unconfirmed_nearline));
        }

        // One backend call per unconfirmed nearline reference, concurrent
        // across checksums.
        let queried = join_all(
            to_query
                .into_iter()
                .map(|(checksum, refs)| self.query_nearline(checksum, refs)),
        )
        .await;
        results.extend(queried);

        Ok(results)
    }

    /// Apply the confirmation state machine to one checksum's unconfirmed
    /// nearline references.
    async fn query_nearline(
        &self,
        checksum: String,
        references: Vec<FileReference>,
    ) -> FileAvailability {
        for reference in &references {
            let storage = &reference.location.storage;
            let call = async {
                let backend = self
                    .resolver
                    .resolve(storage)
                    .await
                    .map_err(|e| StorageError::AvailabilityCheck(e.to_string()))?;
                backend.check_availability(reference).await
            };

            match tokio::time::timeout(self.availability_timeout, call).await {
                Ok(Ok(availability)) if availability.available => {
                    let expiration = availability
                        .expiration_date
                        .unwrap_or_else(|| Utc::now() + self.external_cache_ttl);
                    let entry = CacheFile::external(
                        &reference.checksum,
                        &reference.filename,
                        &reference.mime_type,
                        reference.file_size,
                        storage,
                        expiration,
                    );
                    if let Err(e) = self.cache_files.upsert(entry).await {
                        tracing::error!(
                            error = %e,
                            checksum = %checksum,
                            "Failed to record external cache entry"
                        );
                    }
                    tracing::debug!(
                        checksum = %checksum,
                        storage = %storage,
                        "Nearline backend reported file available"
                    );
                    return FileAvailability::available(checksum.as_str(), Some(expiration));
                }
                Ok(Ok(availability)) => {
                    // Explicit negative answer: durable, remember it so the
                    // next check skips the backend.
                    if let Err(e) = self
                        .file_references
                        .confirm_nearline_unavailable(storage, &reference.checksum)
                        .await
                    {
                        tracing::error!(
                            error = %e,
                            checksum = %checksum,
                            storage = %storage,
                            "Failed to record nearline confirmation"
                        );
                    }
                    tracing::debug!(
                        checksum = %checksum,
                        storage = %storage,
                        message = %availability.message,
                        "Nearline backend reported file not available"
                    );
                }
                Ok(Err(e)) => {
                    // Fail-safe: an error is not an explicit negative answer
                    // and must not flip the confirmation flag.
                    tracing::warn!(
                        error = %e,
                        checksum = %checksum,
                        storage = %storage,
                        "Availability check failed, treating as not available"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        checksum = %checksum,
                        storage = %storage,
                        timeout_secs = self.availability_timeout.as_secs(),
                        "Availability check timed out, treating as not available"
                    );
                }
            }
        }

        FileAvailability::unavailable(checksum.as_str())
    }
}
