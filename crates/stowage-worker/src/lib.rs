//! Stowage Worker Library
//!
//! Drives backend execution: working subsets are run concurrently under a
//! semaphore with exactly-one-callback enforcement, and nearline backends
//! are periodically polled for pending-action outcomes.

pub mod executor;
pub mod periodic;

pub use executor::{SubsetExecutor, SubsetExecutorConfig};
pub use periodic::PendingActionMonitor;
