//! Executor tests: exactly-one callback per dispatched request, subset
//! fault conversion, and the pending-action flow end to end.

use std::sync::Arc;

use serde_json::json;

use stowage_core::models::{FileCacheRequest, FileStorageRequest, StorageLocationConfiguration};
use stowage_core::StorageKind;
use stowage_services::events::StorageEvent;
use stowage_services::progress::ProgressRecorder;
use stowage_services::resolver::BackendResolver;
use stowage_services::test_helpers::{
    mock_location, MockBackend, MockCacheFileRepository, MockFileReferenceRepository,
    MockRequestRepository, MockStorageLocationRepository, MockStoreMode, RecordingEventPublisher,
};
use stowage_storage::progress::PendingActionProgress;
use stowage_storage::{BackendRegistry, RestorationWorkingSubset, StorageWorkingSubset};
use stowage_worker::{PendingActionMonitor, SubsetExecutor, SubsetExecutorConfig};

struct Setup {
    files: MockFileReferenceRepository,
    cache: MockCacheFileRepository,
    storage_requests: MockRequestRepository<FileStorageRequest>,
    cache_requests: MockRequestRepository<FileCacheRequest>,
    events: Arc<RecordingEventPublisher>,
    locations: MockStorageLocationRepository,
    resolver: Arc<BackendResolver>,
    recorder: Arc<ProgressRecorder>,
    executor: SubsetExecutor,
}

fn setup_with_registry(registry: BackendRegistry) -> Setup {
    let files = MockFileReferenceRepository::new();
    let cache = MockCacheFileRepository::new();
    let storage_requests = MockRequestRepository::new();
    let deletion_requests = MockRequestRepository::new();
    let cache_requests = MockRequestRepository::new();
    let events = Arc::new(RecordingEventPublisher::new());
    let locations = MockStorageLocationRepository::new();
    let resolver = Arc::new(BackendResolver::new(Arc::new(locations.clone()), registry));
    let recorder = Arc::new(ProgressRecorder::new(
        Arc::new(files.clone()),
        Arc::new(cache.clone()),
        Arc::new(storage_requests.clone()),
        Arc::new(deletion_requests.clone()),
        Arc::new(cache_requests.clone()),
        events.clone(),
    ));
    let executor = SubsetExecutor::with_recorder(
        resolver.clone(),
        recorder.clone(),
        SubsetExecutorConfig::default(),
    );
    Setup {
        files,
        cache,
        storage_requests,
        cache_requests,
        events,
        locations,
        resolver,
        recorder,
        executor,
    }
}

fn setup() -> Setup {
    setup_with_registry(BackendRegistry::new())
}

fn storage_request(checksum: &str, storage: &str) -> FileStorageRequest {
    FileStorageRequest::new(
        checksum,
        "sha256",
        format!("{}.bin", checksum),
        "application/octet-stream",
        format!("file:///tmp/sources/{}", checksum),
        Some(storage.to_string()),
        None,
    )
}

fn event_counts(events: &[StorageEvent]) -> (usize, usize) {
    let succeeded = events
        .iter()
        .filter(|e| matches!(e, StorageEvent::StoreSucceeded { .. }))
        .count();
    let failed = events
        .iter()
        .filter(|e| matches!(e, StorageEvent::StoreFailed { .. }))
        .count();
    (succeeded, failed)
}

#[tokio::test]
async fn every_request_gets_exactly_one_callback() {
    let s = setup();
    s.locations.add(mock_location("disk-1", StorageKind::Online));
    let backend = MockBackend::online("disk-1");
    s.resolver.insert("disk-1", backend.clone()).await;

    let requests: Vec<FileStorageRequest> = ["aaa", "bbb", "ccc"]
        .iter()
        .map(|c| storage_request(c, "disk-1"))
        .collect();
    for request in &requests {
        s.storage_requests.add(request.clone());
    }
    // The backend "forgets" to report the middle request.
    backend.set_store_mode(MockStoreMode::SilentlyDrop(
        [requests[1].id].into_iter().collect(),
    ));

    s.executor
        .execute_storage_batch(vec![StorageWorkingSubset::new("disk-1", requests.clone())])
        .await;

    assert!(s.files.get("disk-1", "aaa").is_some());
    assert!(s.files.get("disk-1", "bbb").is_none());
    assert!(s.files.get("disk-1", "ccc").is_some());

    assert!(!s.storage_requests.contains(requests[0].id));
    assert!(s.storage_requests.contains(requests[1].id));
    assert!(!s.storage_requests.contains(requests[2].id));
    assert!(s
        .storage_requests
        .error_of(requests[1].id)
        .unwrap()
        .contains("no outcome"));

    // succeed + fail callbacks sum to the subset size.
    let events = s.events.events.lock().unwrap();
    let (succeeded, failed) = event_counts(&events);
    assert_eq!(succeeded, 2);
    assert_eq!(failed, 1);
    assert_eq!(succeeded + failed, requests.len());
}

#[tokio::test]
async fn subset_fault_converts_every_request_to_failure() {
    let s = setup();
    s.locations.add(mock_location("disk-1", StorageKind::Online));
    let backend = MockBackend::online("disk-1");
    s.resolver.insert("disk-1", backend.clone()).await;
    backend.set_store_mode(MockStoreMode::Fault("connection reset".to_string()));

    let requests: Vec<FileStorageRequest> = ["aaa", "bbb", "ccc"]
        .iter()
        .map(|c| storage_request(c, "disk-1"))
        .collect();
    for request in &requests {
        s.storage_requests.add(request.clone());
    }

    s.executor
        .execute_storage_batch(vec![StorageWorkingSubset::new("disk-1", requests.clone())])
        .await;

    for request in &requests {
        assert!(s.files.get("disk-1", &request.checksum).is_none());
        assert!(s.storage_requests.contains(request.id));
        let cause = s.storage_requests.error_of(request.id).unwrap();
        assert!(cause.contains("backend failure"));
        assert!(cause.contains("connection reset"));
    }

    let events = s.events.events.lock().unwrap();
    let (succeeded, failed) = event_counts(&events);
    assert_eq!(succeeded, 0);
    assert_eq!(failed, requests.len());
}

#[tokio::test]
async fn duplicate_callbacks_are_suppressed() {
    let s = setup();
    s.locations.add(mock_location("disk-1", StorageKind::Online));
    let backend = MockBackend::online("disk-1");
    s.resolver.insert("disk-1", backend.clone()).await;
    backend.set_store_mode(MockStoreMode::DuplicateReports);

    let requests: Vec<FileStorageRequest> = ["aaa", "bbb"]
        .iter()
        .map(|c| storage_request(c, "disk-1"))
        .collect();
    for request in &requests {
        s.storage_requests.add(request.clone());
    }

    s.executor
        .execute_storage_batch(vec![StorageWorkingSubset::new("disk-1", requests.clone())])
        .await;

    let events = s.events.events.lock().unwrap();
    let (succeeded, failed) = event_counts(&events);
    assert_eq!(succeeded, requests.len());
    assert_eq!(failed, 0);
}

#[tokio::test]
async fn unresolvable_backend_fails_the_subset() {
    let s = setup();
    // No location configured for "ghost".
    let request = storage_request("aaa", "ghost");
    s.storage_requests.add(request.clone());

    s.executor
        .execute_storage_batch(vec![StorageWorkingSubset::new("ghost", vec![request.clone()])])
        .await;

    assert!(s.storage_requests.contains(request.id));
    assert!(s
        .storage_requests
        .error_of(request.id)
        .unwrap()
        .contains("cannot resolve storage ghost"));
}

#[tokio::test]
async fn restoration_batch_creates_internal_cache_entries() {
    let s = setup();
    s.locations.add(mock_location("tier-2", StorageKind::Nearline));
    let backend = MockBackend::nearline("tier-2");
    s.resolver.insert("tier-2", backend.clone()).await;

    let request = FileCacheRequest::new(
        "restored",
        "tier-2",
        "mock://tier-2/restored",
        "restored.bin",
        "application/octet-stream",
        16,
        "/var/lib/stowage/cache",
    );
    s.cache_requests.add(request.clone());

    s.executor
        .execute_restoration_batch(vec![RestorationWorkingSubset::new(
            "tier-2",
            vec![request.clone()],
        )])
        .await;

    let entry = s.cache.get("restored").unwrap();
    assert_eq!(entry.file_size, 16);
    assert!(!s.cache_requests.contains(request.id));
}

#[tokio::test]
async fn pending_action_settles_through_monitor() {
    let s = setup_with_registry(BackendRegistry::with_builtins());
    let archive = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let sources = tempfile::tempdir().unwrap();

    s.locations.add(StorageLocationConfiguration::new(
        "tier-2",
        StorageKind::Nearline,
        "staged",
        json!({
            "archive_root": archive.path().display().to_string(),
            "staging_root": staging.path().display().to_string(),
            "write_behind": true,
        }),
    ));

    let source = sources.path().join("src.bin");
    tokio::fs::write(&source, b"pending bytes").await.unwrap();

    // Unverified algorithm keeps the staged backend from checking the digest.
    let request = FileStorageRequest::new(
        "pending123",
        "md5",
        "src.bin",
        "application/octet-stream",
        format!("file://{}", source.display()),
        Some("tier-2".to_string()),
        None,
    );
    s.storage_requests.add(request.clone());

    s.executor
        .execute_storage_batch(vec![StorageWorkingSubset::new("tier-2", vec![request])])
        .await;

    let reference = s.files.get("tier-2", "pending123").unwrap();
    assert!(reference.location.pending_action_remaining);

    let progress: Arc<dyn PendingActionProgress> = s.recorder.clone();
    let monitor = PendingActionMonitor::new(
        Arc::new(s.locations.clone()),
        s.resolver.clone(),
        progress,
        3600,
    );
    monitor.scan_once().await.unwrap();

    let reference = s.files.get("tier-2", "pending123").unwrap();
    assert!(!reference.location.pending_action_remaining);
    assert!(tokio::fs::try_exists(archive.path().join("pending123"))
        .await
        .unwrap());
}
