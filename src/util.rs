//! Small helpers shared across modules: hashing and constant-time comparison.

use sha2::{Digest, Sha256};

/// Lowercase hex-encoded SHA-256 digest of `secret`, the format used for
/// both client key hashes and the admin token hash in the config file.
pub fn hash_secret(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    hex::encode(digest)
}

/// Constant-time equality for two hex digest strings: length-checked first,
/// then merged byte-by-byte so early mismatches don't short-circuit timing.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
