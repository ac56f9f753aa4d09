//! Progress recorder tests: backend-reported outcomes mutate persisted
//! state exactly as the protocol specifies.

use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Utc};

use stowage_core::models::{
    CacheLocation, FileCacheRequest, FileDeletionRequest, FileStorageRequest,
};
use stowage_services::events::StorageEvent;
use stowage_services::progress::ProgressRecorder;
use stowage_services::test_helpers::{
    mock_reference, MockCacheFileRepository, MockFileReferenceRepository, MockRequestRepository,
    RecordingEventPublisher,
};
use stowage_storage::progress::{
    DeletionProgress, PendingActionProgress, RestorationProgress, StorageProgress,
};

struct Setup {
    files: MockFileReferenceRepository,
    cache: MockCacheFileRepository,
    storage_requests: MockRequestRepository<FileStorageRequest>,
    deletion_requests: MockRequestRepository<FileDeletionRequest>,
    cache_requests: MockRequestRepository<FileCacheRequest>,
    events: Arc<RecordingEventPublisher>,
    recorder: ProgressRecorder,
}

fn setup() -> Setup {
    let files = MockFileReferenceRepository::new();
    let cache = MockCacheFileRepository::new();
    let storage_requests = MockRequestRepository::new();
    let deletion_requests = MockRequestRepository::new();
    let cache_requests = MockRequestRepository::new();
    let events = Arc::new(RecordingEventPublisher::new());
    let recorder = ProgressRecorder::new(
        Arc::new(files.clone()),
        Arc::new(cache.clone()),
        Arc::new(storage_requests.clone()),
        Arc::new(deletion_requests.clone()),
        Arc::new(cache_requests.clone()),
        events.clone(),
    );
    Setup {
        files,
        cache,
        storage_requests,
        deletion_requests,
        cache_requests,
        events,
        recorder,
    }
}

fn storage_request(checksum: &str) -> FileStorageRequest {
    FileStorageRequest::new(
        checksum,
        "sha256",
        format!("{}.bin", checksum),
        "application/octet-stream",
        format!("file:///tmp/sources/{}", checksum),
        Some("disk-1".to_string()),
        None,
    )
}

#[tokio::test]
async fn storage_success_creates_reference_and_removes_request() {
    let s = setup();
    let request = storage_request("aaa");
    s.storage_requests.add(request.clone());

    s.recorder
        .storage_succeeded(&request, "file:///data/disk-1/aaa", 42)
        .await;

    let reference = s.files.get("disk-1", "aaa").unwrap();
    assert_eq!(reference.file_size, 42);
    assert_eq!(reference.location.url, "file:///data/disk-1/aaa");
    assert!(!reference.location.pending_action_remaining);
    assert!(!s.storage_requests.contains(request.id));

    let events = s.events.events.lock().unwrap();
    assert!(matches!(
        events[0],
        StorageEvent::StoreSucceeded { pending_action: false, .. }
    ));
}

#[tokio::test]
async fn storage_success_with_pending_action_flags_the_reference() {
    let s = setup();
    let request = storage_request("bbb");
    s.storage_requests.add(request.clone());

    s.recorder
        .storage_succeeded_with_pending_action(&request, "file:///data/disk-1/bbb", 7, true)
        .await;

    let reference = s.files.get("disk-1", "bbb").unwrap();
    assert!(reference.location.pending_action_remaining);
    assert!(!s.storage_requests.contains(request.id));

    let events = s.events.events.lock().unwrap();
    assert!(matches!(
        events[0],
        StorageEvent::StoreSucceeded {
            pending_action: true,
            notify_administrators: true,
            ..
        }
    ));
}

#[tokio::test]
async fn storage_failure_retains_request_with_cause() {
    let s = setup();
    let request = storage_request("ccc");
    s.storage_requests.add(request.clone());

    s.recorder.storage_failed(&request, "disk full").await;

    assert!(s.files.get("disk-1", "ccc").is_none());
    assert!(s.storage_requests.contains(request.id));
    assert_eq!(s.storage_requests.error_of(request.id).unwrap(), "disk full");

    let events = s.events.events.lock().unwrap();
    assert!(matches!(events[0], StorageEvent::StoreFailed { .. }));
}

#[tokio::test]
async fn deletion_success_removes_reference_and_request() {
    let s = setup();
    s.files.add(mock_reference("ddd", "disk-1"));
    let request = FileDeletionRequest::new("ddd", "disk-1", "mock://disk-1/ddd");
    s.deletion_requests.add(request.clone());

    s.recorder.deletion_succeeded(&request).await;

    assert!(s.files.get("disk-1", "ddd").is_none());
    assert!(!s.deletion_requests.contains(request.id));
}

#[tokio::test]
async fn restoration_success_creates_internal_cache_entry() {
    let s = setup();
    let request = FileCacheRequest::new(
        "eee",
        "tier-2",
        "mock://tier-2/eee",
        "eee.bin",
        "application/octet-stream",
        9,
        "/var/lib/stowage/cache",
    );
    s.cache_requests.add(request.clone());
    let expiration = Utc::now() + Duration::hours(12);

    s.recorder
        .restoration_succeeded(&request, Path::new("/var/lib/stowage/cache/eee"), 9, expiration)
        .await;

    let entry = s.cache.get("eee").unwrap();
    assert_eq!(entry.expiration_date, expiration);
    assert!(matches!(
        entry.location,
        CacheLocation::Internal { ref path } if path == "/var/lib/stowage/cache/eee"
    ));
    assert!(!s.cache_requests.contains(request.id));
}

#[tokio::test]
async fn restoration_failure_retains_request_with_cause() {
    let s = setup();
    let request = FileCacheRequest::new(
        "fff",
        "tier-2",
        "mock://tier-2/fff",
        "fff.bin",
        "application/octet-stream",
        9,
        "/var/lib/stowage/cache",
    );
    s.cache_requests.add(request.clone());

    s.recorder.restoration_failed(&request, "archive offline").await;

    assert!(s.cache.get("fff").is_none());
    assert!(s.cache_requests.contains(request.id));
    assert_eq!(
        s.cache_requests.error_of(request.id).unwrap(),
        "archive offline"
    );
}

#[tokio::test]
async fn pending_action_success_clears_the_flag() {
    let s = setup();
    let mut reference = mock_reference("ggg", "tier-2");
    reference.location.pending_action_remaining = true;
    s.files.add(reference);

    s.recorder.pending_action_succeeded("tier-2", "ggg").await;

    assert!(!s.files.get("tier-2", "ggg").unwrap().location.pending_action_remaining);

    let events = s.events.events.lock().unwrap();
    assert!(matches!(events[0], StorageEvent::PendingActionCompleted { .. }));
}

#[tokio::test]
async fn pending_action_failure_keeps_flag_and_publishes() {
    let s = setup();
    let mut reference = mock_reference("hhh", "tier-2");
    reference.location.pending_action_remaining = true;
    s.files.add(reference);

    s.recorder
        .pending_action_failed("tier-2", "hhh", "archive build failed")
        .await;

    assert!(s.files.get("tier-2", "hhh").unwrap().location.pending_action_remaining);

    let events = s.events.events.lock().unwrap();
    assert!(matches!(events[0], StorageEvent::PendingActionFailed { .. }));
}
