//! Stable per-message fingerprints.

use crate::message::Message;
use sha2::{Digest, Sha256};

/// Computes the fingerprint for a message.
///
/// A caller-supplied idempotency tag is used verbatim. Otherwise the
/// fingerprint is the hex-encoded SHA-256 of the `(to, from, subject, body)`
/// tuple. Each field is length-prefixed before hashing so that adjacent
/// fields cannot alias (`("ab", "c")` vs `("a", "bc")`), and the digest is
/// stable across process restarts for the same tuple.
pub fn fingerprint(message: &Message) -> String {
    if let Some(key) = &message.idempotency_key {
        return key.clone();
    }

    let mut hasher = Sha256::new();
    for field in [
        &message.to,
        &message.from,
        &message.subject,
        &message.body,
    ] {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
