//! Storage location configuration: a named, versioned backend instance.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::Validate;

use crate::storage_types::StorageKind;

/// A named backend instance: tier, backend type, and the backend-specific
/// configuration payload the factory validates and constructs from.
///
/// Every `FileReference::location.storage` names exactly one of these.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StorageLocationConfiguration {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    pub kind: StorageKind,
    /// Backend type identifier resolved through the backend registry
    /// (e.g. "local", "staged", "s3").
    #[validate(length(min = 1, max = 64))]
    pub backend_type: String,
    /// Backend-specific configuration, parsed by the backend's config struct.
    pub configuration: JsonValue,
    /// Allocated capacity in kilobytes, if capped.
    #[validate(range(min = 0))]
    pub allocated_size_kb: Option<i64>,
}

impl StorageLocationConfiguration {
    pub fn new(
        name: impl Into<String>,
        kind: StorageKind,
        backend_type: impl Into<String>,
        configuration: JsonValue,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            backend_type: backend_type.into(),
            configuration,
            allocated_size_kb: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_name_fails_validation() {
        let conf = StorageLocationConfiguration::new("", StorageKind::Online, "local", json!({}));
        assert!(conf.validate().is_err());
    }

    #[test]
    fn negative_allocation_fails_validation() {
        let mut conf =
            StorageLocationConfiguration::new("disk-1", StorageKind::Online, "local", json!({}));
        conf.allocated_size_kb = Some(-1);
        assert!(conf.validate().is_err());

        conf.allocated_size_kb = Some(10_240);
        assert!(conf.validate().is_ok());
    }
}
