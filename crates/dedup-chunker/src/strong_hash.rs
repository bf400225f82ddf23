//! The strong hasher: SHA-1 over a chunk's bytes.
//!
//! The only contract the protocol relies on is that equal byte sequences
//! hash identically and that collisions are cryptographically negligible —
//! `strong_fp` equality stands in for content equality throughout the
//! dedup protocol.

use dedup_core::StrongFp;
use sha1::{Digest, Sha1};

pub fn strong_hash(bytes: &[u8]) -> StrongFp {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_bytes_hash_identically() {
        let a = strong_hash(b"hello world");
        let b = strong_hash(b"hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn different_bytes_hash_differently() {
        let a = strong_hash(b"hello world");
        let b = strong_hash(b"hello worlD");
        assert_ne!(a, b);
    }

    #[test]
    fn empty_input_has_a_well_known_digest() {
        // SHA-1("") = da39a3ee5e6b4b0d3255bfef95601890afd80709
        let digest = strong_hash(b"");
        assert_eq!(hex::encode(digest), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }
}
