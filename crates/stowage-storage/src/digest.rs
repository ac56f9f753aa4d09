//! Content checksum helpers shared by the backends.

use sha2::{Digest, Sha256};

use crate::traits::{StorageError, StorageResult};

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Verify `data` against the request checksum when the algorithm is known.
pub(crate) fn verify_checksum(algorithm: &str, expected: &str, data: &[u8]) -> StorageResult<()> {
    if !algorithm.eq_ignore_ascii_case("sha256") {
        tracing::debug!(
            algorithm,
            "no digest implementation for algorithm, storing unverified"
        );
        return Ok(());
    }

    let actual = sha256_hex(data);
    if actual != expected.to_lowercase() {
        return Err(StorageError::StoreFailed(format!(
            "checksum mismatch: expected {}, computed {}",
            expected, actual
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_sha256() {
        let data = b"checksum me";
        let digest = sha256_hex(data);
        assert!(verify_checksum("sha256", &digest, data).is_ok());
        assert!(verify_checksum("SHA256", &digest.to_uppercase(), data).is_ok());
    }

    #[test]
    fn rejects_mismatch() {
        let err = verify_checksum("sha256", &sha256_hex(b"other"), b"data").unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn unknown_algorithm_is_stored_unverified() {
        assert!(verify_checksum("md5", "whatever", b"data").is_ok());
    }
}
