//! Download orchestrator tests: cache-first serving and ledger
//! reconciliation on the two failure kinds.

use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::StreamExt;

use stowage_core::models::CacheFile;
use stowage_core::StorageKind;
use stowage_services::download::{DownloadService, FileDownload};
use stowage_services::resolver::BackendResolver;
use stowage_services::test_helpers::{
    mock_location, mock_reference, MockBackend, MockCacheFileRepository, MockDownloadBehavior,
    MockFileReferenceRepository, MockStorageLocationRepository,
};
use stowage_storage::{BackendRegistry, StorageError};

struct Setup {
    files: MockFileReferenceRepository,
    cache: MockCacheFileRepository,
    locations: MockStorageLocationRepository,
    resolver: Arc<BackendResolver>,
    service: DownloadService,
}

fn setup() -> Setup {
    let files = MockFileReferenceRepository::new();
    let cache = MockCacheFileRepository::new();
    let locations = MockStorageLocationRepository::new();
    let resolver = Arc::new(BackendResolver::new(
        Arc::new(locations.clone()),
        BackendRegistry::new(),
    ));
    let service = DownloadService::new(
        Arc::new(files.clone()),
        Arc::new(cache.clone()),
        resolver.clone(),
    );
    Setup {
        files,
        cache,
        locations,
        resolver,
        service,
    }
}

async fn collect(download: FileDownload) -> Vec<u8> {
    let mut stream = download.stream;
    let mut bytes = Vec::new();
    while let Some(chunk) = stream.next().await {
        bytes.extend_from_slice(&chunk.unwrap());
    }
    bytes
}

fn external_entry(checksum: &str, storage: &str) -> CacheFile {
    CacheFile::external(
        checksum,
        format!("{}.bin", checksum),
        "application/octet-stream",
        4,
        storage,
        Utc::now() + Duration::hours(1),
    )
}

/// Wires a nearline mock backend with a cached external entry for `checksum`.
async fn external_setup(checksum: &str) -> (Setup, Arc<MockBackend>) {
    let s = setup();
    s.locations.add(mock_location("tier-2", StorageKind::Nearline));
    let backend = MockBackend::nearline("tier-2");
    s.resolver.insert("tier-2", backend.clone()).await;
    s.files.add(mock_reference(checksum, "tier-2"));
    s.cache.add(external_entry(checksum, "tier-2"));
    (s, backend)
}

#[tokio::test]
async fn internal_entry_streams_local_bytes() {
    let s = setup();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("abc");
    tokio::fs::write(&path, b"cached bytes").await.unwrap();

    s.cache.add(CacheFile::internal(
        "abc",
        "abc.bin",
        "application/octet-stream",
        12,
        path.display().to_string(),
        Utc::now() + Duration::hours(1),
    ));

    let download = s.service.download("abc").await.unwrap();
    assert_eq!(collect(download).await, b"cached bytes");
    assert!(s.cache.contains("abc"));
}

#[tokio::test]
async fn external_download_success_retains_entry() {
    let (s, backend) = external_setup("ext-ok").await;
    backend.set_download("ext-ok", MockDownloadBehavior::Bytes(b"tiered".to_vec()));

    let download = s.service.download("ext-ok").await.unwrap();
    assert_eq!(collect(download).await, b"tiered");
    assert!(s.cache.contains("ext-ok"));
    assert_eq!(backend.download_call_count(), 1);
}

#[tokio::test]
async fn transient_download_failure_retains_entry() {
    let (s, backend) = external_setup("ext-flaky").await;
    backend.set_download("ext-flaky", MockDownloadBehavior::Transient);

    let result = s.service.download("ext-flaky").await;
    assert!(matches!(result, Err(StorageError::DownloadFailed(_))));
    // The copy is presumed still cached: the entry stays for retry.
    assert!(s.cache.contains("ext-flaky"));
}

#[tokio::test]
async fn not_available_failure_removes_entry() {
    let (s, backend) = external_setup("ext-gone").await;
    backend.set_download("ext-gone", MockDownloadBehavior::NotAvailable);

    let result = s.service.download("ext-gone").await;
    assert!(matches!(result, Err(StorageError::NotAvailable(_))));
    // The ledger entry was stale and is gone afterwards.
    assert!(!s.cache.contains("ext-gone"));
}

#[tokio::test]
async fn expired_entry_is_removed_without_backend_call() {
    let (s, backend) = external_setup("ext-old").await;
    let mut entry = external_entry("ext-old", "tier-2");
    entry.expiration_date = Utc::now() - Duration::minutes(1);
    s.cache.add(entry);

    let result = s.service.download("ext-old").await;
    assert!(matches!(result, Err(StorageError::NotAvailable(_))));
    assert!(!s.cache.contains("ext-old"));
    assert_eq!(backend.download_call_count(), 0);
}

#[tokio::test]
async fn missing_entry_is_not_available() {
    let s = setup();
    let result = s.service.download("nowhere").await;
    assert!(matches!(result, Err(StorageError::NotAvailable(_))));
}

#[tokio::test]
async fn evicted_internal_file_invalidates_entry() {
    let s = setup();
    s.cache.add(CacheFile::internal(
        "lost",
        "lost.bin",
        "application/octet-stream",
        4,
        "/nonexistent/stowage/cache/lost",
        Utc::now() + Duration::hours(1),
    ));

    let result = s.service.download("lost").await;
    assert!(matches!(result, Err(StorageError::NotAvailable(_))));
    assert!(!s.cache.contains("lost"));
}

#[tokio::test]
async fn stale_external_entry_without_reference_is_removed() {
    let s = setup();
    s.locations.add(mock_location("tier-2", StorageKind::Nearline));
    let backend = MockBackend::nearline("tier-2");
    s.resolver.insert("tier-2", backend.clone()).await;
    // Ledger entry without a file reference behind it.
    s.cache.add(external_entry("orphan", "tier-2"));

    let result = s.service.download("orphan").await;
    assert!(matches!(result, Err(StorageError::NotAvailable(_))));
    assert!(!s.cache.contains("orphan"));
    assert_eq!(backend.download_call_count(), 0);
}
