//! Stowage Services Library
//!
//! Orchestration services for tiered file storage: dispatching pending
//! requests into per-backend working subsets, recording asynchronous
//! progress reports, answering availability queries through the nearline
//! confirmation cache, serving downloads cache-first, and purging expired
//! cache ledger entries.

pub mod availability;
pub mod cleanup;
pub mod dispatch;
pub mod download;
pub mod events;
pub mod progress;
pub mod resolver;
pub mod test_helpers;

// Re-export commonly used types
pub use availability::AvailabilityService;
pub use cleanup::CacheCleanupService;
pub use dispatch::{AllocationStrategy, FirstOnlineStrategy, RequestDispatcher};
pub use download::{DownloadService, FileDownload};
pub use events::{EventPublisher, StorageEvent, TracingEventPublisher};
pub use progress::ProgressRecorder;
pub use resolver::BackendResolver;
