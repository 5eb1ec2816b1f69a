//! SHA-256 receipt fingerprints.
//!
//! Rejected receipts are logged by fingerprint so the audit trail never
//! holds raw purchase tokens.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of the receipt bytes.
pub fn receipt_fingerprint(receipt: &[u8]) -> String {
    hex::encode(Sha256::digest(receipt))
}

/// First 16 hex chars of the fingerprint, for log lines.
pub fn short_fingerprint(receipt: &[u8]) -> String {
    let mut full = receipt_fingerprint(receipt);
    full.truncate(16);
    full
}
