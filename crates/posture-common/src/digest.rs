//! Payload digest helpers

use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Compute SHA-256 hash and return as lowercase hex
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Verify a SHA-256 checksum (hex, case-insensitive)
pub fn verify_sha256(data: &[u8], expected_hex: &str) -> bool {
    sha256_hex(data).eq_ignore_ascii_case(expected_hex.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_verify_sha256() {
        let body = br#"{"identity":{"hostname":"web-01"}}"#;
        let digest = sha256_hex(body);
        assert!(verify_sha256(body, &digest));
        assert!(verify_sha256(body, &digest.to_uppercase()));
        assert!(!verify_sha256(b"tampered", &digest));
        assert!(!verify_sha256(body, "invalid"));
    }
}
