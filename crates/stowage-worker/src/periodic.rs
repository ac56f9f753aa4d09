//! Pending-action monitor.
//!
//! Periodically invokes `run_periodic_action` on every nearline backend so
//! that requests which succeeded with a pending action get promoted to
//! fully-succeeded or to error.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;

use stowage_core::StorageKind;
use stowage_db::StorageLocationConfigurationRepository;
use stowage_services::resolver::BackendResolver;
use stowage_storage::progress::PendingActionProgress;

pub struct PendingActionMonitor {
    locations: Arc<dyn StorageLocationConfigurationRepository>,
    resolver: Arc<BackendResolver>,
    progress: Arc<dyn PendingActionProgress>,
    interval_secs: u64,
}

impl PendingActionMonitor {
    pub fn new(
        locations: Arc<dyn StorageLocationConfigurationRepository>,
        resolver: Arc<BackendResolver>,
        progress: Arc<dyn PendingActionProgress>,
        interval_secs: u64,
    ) -> Self {
        Self {
            locations,
            resolver,
            progress,
            interval_secs,
        }
    }

    /// Start the background scan loop.
    /// Returns a JoinHandle for graceful shutdown.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = interval(Duration::from_secs(self.interval_secs.max(1)));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tracing::info!(interval_secs = self.interval_secs, "Pending action monitor started");

            loop {
                tick.tick().await;

                if let Err(e) = self.scan_once().await {
                    tracing::error!(error = %e, "Pending action scan failed");
                }
            }
        })
    }

    /// One scan over every nearline backend.
    #[tracing::instrument(skip(self))]
    pub async fn scan_once(&self) -> anyhow::Result<()> {
        let nearline = self.locations.find_by_kind(StorageKind::Nearline).await?;

        for conf in nearline {
            match self.resolver.resolve(&conf.name).await {
                Ok(backend) => {
                    if let Err(e) = backend.run_periodic_action(self.progress.clone()).await {
                        tracing::error!(
                            storage = %conf.name,
                            error = %e,
                            "Periodic action failed"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        storage = %conf.name,
                        error = %e,
                        "Cannot resolve nearline backend for periodic action"
                    );
                }
            }
        }
        Ok(())
    }
}
