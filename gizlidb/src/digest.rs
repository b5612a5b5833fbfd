//! Deterministic searchable digest for equality matching on encrypted fields.
//!
//! The digest is the base64 encoding of the SHA-256 of the plaintext. It
//! depends only on the plaintext, never on the per-write IV, so two writes
//! of the same value always produce the same digest and an equality filter
//! can be answered by digest comparison without decrypting anything. The
//! digest is one-way: plaintext cannot be recovered from it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha2::{Digest, Sha256};

/// Computes the searchable digest of a plaintext value.
#[must_use]
pub fn searchable_digest(plaintext: &str) -> String {
    STANDARD.encode(Sha256::digest(plaintext.as_bytes()))
}
