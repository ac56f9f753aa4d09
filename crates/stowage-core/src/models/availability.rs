//! Availability query boundary types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Availability of one checksum, as answered to the query boundary.
///
/// Checksums with no known file reference are omitted from the response set,
/// not errored.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileAvailability {
    pub checksum: String,
    pub available: bool,
    /// When the fast-access copy backing this answer expires, if bounded.
    pub expiration_date: Option<DateTime<Utc>>,
}

impl FileAvailability {
    pub fn available(checksum: impl Into<String>, expiration_date: Option<DateTime<Utc>>) -> Self {
        Self {
            checksum: checksum.into(),
            available: true,
            expiration_date,
        }
    }

    pub fn unavailable(checksum: impl Into<String>) -> Self {
        Self {
            checksum: checksum.into(),
            available: false,
            expiration_date: None,
        }
    }
}
