//! Content fingerprinting: SHA-256 over the whole file.

use sha2::{Digest as _, Sha256};

use crate::HASH_LENGTH;

pub type Digest = [u8; HASH_LENGTH];

/// Computes the SHA-256 digest of `bytes`.
pub fn fingerprint(bytes: &[u8]) -> Digest {
    Sha256::digest(bytes).into()
}

/// Lowercase hex rendering, used in logs.
pub fn to_hex(digest: &Digest) -> String {
    hex::encode(digest)
}
