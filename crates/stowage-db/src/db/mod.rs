//! Postgres repository implementations.

pub mod cache_file;
pub mod file_reference;
pub mod requests;
pub mod storage_location;

pub use cache_file::PgCacheFileRepository;
pub use file_reference::PgFileReferenceRepository;
pub use requests::{
    PgCacheRequestRepository, PgDeletionRequestRepository, PgStorageRequestRepository,
};
pub use storage_location::PgStorageLocationRepository;
