//! Outbound event channel.
//!
//! Terminal request outcomes and pending-action completions are published
//! here fire-and-forget; delivery guarantees are the channel implementation's
//! concern, not this core's.

use async_trait::async_trait;
use serde::Serialize;

/// Events emitted by the orchestration services.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageEvent {
    StoreSucceeded {
        checksum: String,
        storage: String,
        stored_url: String,
        pending_action: bool,
        notify_administrators: bool,
    },
    StoreFailed {
        checksum: String,
        storage: Option<String>,
        cause: String,
    },
    DeletionSucceeded {
        checksum: String,
        storage: String,
    },
    DeletionFailed {
        checksum: String,
        storage: String,
        cause: String,
    },
    RestorationSucceeded {
        checksum: String,
        storage: String,
        restored_path: String,
    },
    RestorationFailed {
        checksum: String,
        storage: String,
        cause: String,
    },
    PendingActionCompleted {
        checksum: String,
        storage: String,
    },
    PendingActionFailed {
        checksum: String,
        storage: String,
        cause: String,
    },
}

/// Fire-and-forget publisher for [`StorageEvent`]s.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: StorageEvent);
}

/// Default publisher: emits events as structured log records.
pub struct TracingEventPublisher;

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish(&self, event: StorageEvent) {
        tracing::info!(event = ?event, "storage event");
    }
}
