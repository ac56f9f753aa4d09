//! Configuration module
//!
//! This module provides the configuration structure for the stowage services
//! and worker, loaded from environment variables with sensible defaults.

use std::env;
use std::str::FromStr;

// Defaults
const CACHE_EXPIRATION_HOURS: i64 = 24;
const AVAILABILITY_TIMEOUT_SECS: u64 = 30;
const SUBSET_MAX_SIZE: usize = 100;
const EXECUTOR_MAX_CONCURRENT_SUBSETS: usize = 4;
const PENDING_ACTION_INTERVAL_SECS: u64 = 300;
const CACHE_CLEANUP_INTERVAL_SECS: u64 = 3600;

/// Stowage runtime configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Postgres connection string; `None` runs without the sqlx repositories.
    pub database_url: Option<String>,
    /// Root directory of the internal disk cache (restored files land here).
    pub cache_path: String,
    /// Lifetime in hours of internal cache entries created by restorations.
    pub cache_expiration_hours: i64,
    /// Timeout for a single nearline `check_availability` call.
    pub availability_timeout_secs: u64,
    /// Maximum number of requests a backend groups into one working subset.
    pub subset_max_size: usize,
    /// Number of working subsets executed concurrently.
    pub executor_max_concurrent_subsets: usize,
    /// Interval between pending-action scans on nearline backends.
    pub pending_action_interval_secs: u64,
    /// Interval between purges of expired cache ledger entries.
    pub cache_cleanup_interval_secs: u64,
}

impl Config {
    /// Load configuration from the environment (reads `.env` if present).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            database_url: env::var("DATABASE_URL").ok(),
            cache_path: env::var("STOWAGE_CACHE_PATH")
                .unwrap_or_else(|_| "/var/lib/stowage/cache".to_string()),
            cache_expiration_hours: parse_env("STOWAGE_CACHE_EXPIRATION_HOURS", CACHE_EXPIRATION_HOURS),
            availability_timeout_secs: parse_env(
                "STOWAGE_AVAILABILITY_TIMEOUT_SECS",
                AVAILABILITY_TIMEOUT_SECS,
            ),
            subset_max_size: parse_env("STOWAGE_SUBSET_MAX_SIZE", SUBSET_MAX_SIZE),
            executor_max_concurrent_subsets: parse_env(
                "STOWAGE_EXECUTOR_MAX_CONCURRENT_SUBSETS",
                EXECUTOR_MAX_CONCURRENT_SUBSETS,
            ),
            pending_action_interval_secs: parse_env(
                "STOWAGE_PENDING_ACTION_INTERVAL_SECS",
                PENDING_ACTION_INTERVAL_SECS,
            ),
            cache_cleanup_interval_secs: parse_env(
                "STOWAGE_CACHE_CLEANUP_INTERVAL_SECS",
                CACHE_CLEANUP_INTERVAL_SECS,
            ),
        }
    }

    /// Validate field ranges. Pure; returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.cache_path.is_empty() {
            errors.push("STOWAGE_CACHE_PATH must not be empty".to_string());
        }
        if self.cache_expiration_hours <= 0 {
            errors.push("STOWAGE_CACHE_EXPIRATION_HOURS must be positive".to_string());
        }
        if self.subset_max_size == 0 {
            errors.push("STOWAGE_SUBSET_MAX_SIZE must be positive".to_string());
        }
        if self.executor_max_concurrent_subsets == 0 {
            errors.push("STOWAGE_EXECUTOR_MAX_CONCURRENT_SUBSETS must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            cache_path: "/var/lib/stowage/cache".to_string(),
            cache_expiration_hours: CACHE_EXPIRATION_HOURS,
            availability_timeout_secs: AVAILABILITY_TIMEOUT_SECS,
            subset_max_size: SUBSET_MAX_SIZE,
            executor_max_concurrent_subsets: EXECUTOR_MAX_CONCURRENT_SUBSETS,
            pending_action_interval_secs: PENDING_ACTION_INTERVAL_SECS,
            cache_cleanup_interval_secs: CACHE_CLEANUP_INTERVAL_SECS,
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset or unparseable.
fn parse_env<T: FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
