//! Test helpers for service unit and integration tests
//!
//! In-memory mock repositories, a scriptable mock backend, and small
//! fixtures so the orchestration services can be tested without a database
//! or real storage.

pub mod mock_backend;
pub mod mock_repositories;

pub use mock_backend::{MockBackend, MockDownloadBehavior, MockPrepareMode, MockStoreMode};
pub use mock_repositories::{
    MockCacheFileRepository, MockFileReferenceRepository, MockRequestRepository,
    MockStorageLocationRepository, RecordingEventPublisher,
};

use serde_json::json;

use stowage_core::models::{FileLocation, FileReference, StorageLocationConfiguration};
use stowage_core::StorageKind;

/// A storage location configuration for a mock backend.
pub fn mock_location(name: &str, kind: StorageKind) -> StorageLocationConfiguration {
    StorageLocationConfiguration::new(name, kind, "mock", json!({}))
}

/// A file reference stored on `storage` with a mock URL.
pub fn mock_reference(checksum: &str, storage: &str) -> FileReference {
    FileReference::new(
        checksum,
        "sha256",
        format!("{}.bin", checksum),
        "application/octet-stream",
        4,
        FileLocation::new(storage, format!("mock://{}/{}", storage, checksum)),
    )
}
