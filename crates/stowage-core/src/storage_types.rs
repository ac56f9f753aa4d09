use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Storage access tiers
///
/// This enum defines the access latency class of a storage location.
/// It's defined in core because it's used in configuration and database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "storage_kind", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Files are synchronously retrievable at all times.
    Online,
    /// Files may require an explicit restore step before retrieval.
    Nearline,
    /// No automated retrieval path.
    Offline,
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(StorageKind::Online),
            "nearline" => Ok(StorageKind::Nearline),
            "offline" => Ok(StorageKind::Offline),
            _ => Err(anyhow::anyhow!("Invalid storage kind: {}", s)),
        }
    }
}

impl Display for StorageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageKind::Online => write!(f, "online"),
            StorageKind::Nearline => write!(f, "nearline"),
            StorageKind::Offline => write!(f, "offline"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        for kind in [
            StorageKind::Online,
            StorageKind::Nearline,
            StorageKind::Offline,
        ] {
            assert_eq!(kind.to_string().parse::<StorageKind>().unwrap(), kind);
        }
        assert!("tape".parse::<StorageKind>().is_err());
    }
}
