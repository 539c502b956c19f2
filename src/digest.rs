//! Short, file-name-safe digests of fingerprint suffix keys

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Length of the encoded digest embedded in snapshot file names
pub const DIGEST_LEN: usize = 15;

/// Encode a suffix key as a truncated URL-safe SHA-256 digest
///
/// The result only contains `[A-Za-z0-9_-]` and is always [`DIGEST_LEN`]
/// characters long.
#[must_use]
pub fn encode(suffix_key: &str) -> String {
    let hash = Sha256::digest(suffix_key.as_bytes());
    let mut encoded = URL_SAFE_NO_PAD.encode(hash);
    encoded.truncate(DIGEST_LEN);
    encoded
}

/// Check whether a string could have been produced by [`encode`]
#[must_use]
pub fn is_digest(candidate: &str) -> bool {
    candidate.len() == DIGEST_LEN
        && candidate
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
