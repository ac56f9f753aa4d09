//! Stowage DB Library
//!
//! Repository traits for the stowage entities (file references, the cache
//! ledger, storage location configurations, and the pending request queues),
//! plus their Postgres implementations behind the default-on `sqlx` feature.
//!
//! Services depend on the traits only (`Arc<dyn …>`), so tests run against
//! in-memory mocks without a database.

pub mod traits;

#[cfg(feature = "sqlx")]
pub mod db;

pub use traits::{
    CacheFileRepository, FileReferenceRepository, RequestRepository,
    StorageLocationConfigurationRepository,
};

#[cfg(feature = "sqlx")]
pub use db::{
    PgCacheFileRepository, PgCacheRequestRepository, PgDeletionRequestRepository,
    PgFileReferenceRepository, PgStorageLocationRepository, PgStorageRequestRepository,
};
