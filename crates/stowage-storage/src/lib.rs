//! Stowage Storage Library
//!
//! This crate provides the storage backend contract and implementations for
//! stowage. Every backend (online, nearline, offline) implements the same
//! [`traits::StorageBackend`] SPI: batch preparation into working subsets,
//! store/delete/retrieve execution reporting outcomes through the progress
//! protocol, and the nearline-only availability/download capabilities.
//!
//! # Stored file layout
//!
//! Filesystem-backed backends address stored files by content checksum,
//! optionally under a request-chosen subdirectory. Stored URLs use the
//! `file://` scheme; keys must not contain `..` or a leading `/`.

pub(crate) mod digest;
pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod progress;
#[cfg(feature = "storage-s3")]
pub mod s3;
#[cfg(feature = "storage-local")]
pub mod staged;
pub mod subset;
pub mod traits;
pub mod urls;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use factory::{BackendConstructor, BackendRegistry};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
#[cfg(feature = "storage-local")]
pub use staged::StagedStorage;
pub use stowage_core::StorageKind;
pub use subset::{
    DeletionWorkingSubset, PreparationResponse, RestorationWorkingSubset, StorageWorkingSubset,
    WorkingSubset,
};
pub use traits::{
    Availability, DownloadStream, StorageBackend, StorageError, StorageResult,
};
