//! Cache ledger model: which checksums have a usable fast-access copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a cache copy lives.
///
/// `Internal` entries point at bytes held by the local disk cache.
/// `External` entries record that a nearline backend's own fast tier has
/// confirmed the file retrievable until the entry's expiration date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CacheLocation {
    Internal { path: String },
    External { storage: String },
}

/// A cache ledger entry mapping a checksum to a fast-access copy.
///
/// Created when a restoration completes or an availability check confirms an
/// external hit; destroyed when expired or when a download discovers the
/// backend no longer holds the copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile {
    pub checksum: String,
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
    pub location: CacheLocation,
    /// Group ownership tags, used by retention policies outside this core.
    pub groups: Vec<String>,
    pub expiration_date: DateTime<Utc>,
}

impl CacheFile {
    pub fn internal(
        checksum: impl Into<String>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        file_size: i64,
        path: impl Into<String>,
        expiration_date: DateTime<Utc>,
    ) -> Self {
        Self {
            checksum: checksum.into(),
            filename: filename.into(),
            mime_type: mime_type.into(),
            file_size,
            location: CacheLocation::Internal { path: path.into() },
            groups: Vec::new(),
            expiration_date,
        }
    }

    pub fn external(
        checksum: impl Into<String>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        file_size: i64,
        storage: impl Into<String>,
        expiration_date: DateTime<Utc>,
    ) -> Self {
        Self {
            checksum: checksum.into(),
            filename: filename.into(),
            mime_type: mime_type.into(),
            file_size,
            location: CacheLocation::External {
                storage: storage.into(),
            },
            groups: Vec::new(),
            expiration_date,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn expiry_boundary() {
        let now = Utc::now();
        let entry = CacheFile::internal("abc", "f.dat", "application/octet-stream", 4, "/tmp/f", now);
        assert!(entry.is_expired(now));
        assert!(entry.is_expired(now + Duration::seconds(1)));
        assert!(!entry.is_expired(now - Duration::seconds(1)));
    }

    #[test]
    fn location_serde_tagging() {
        let entry = CacheFile::external("abc", "f.dat", "text/plain", 4, "glacier", Utc::now());
        let json = serde_json::to_value(&entry.location).unwrap();
        assert_eq!(json["kind"], "external");
        assert_eq!(json["storage"], "glacier");
    }
}
