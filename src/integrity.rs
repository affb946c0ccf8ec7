// src/integrity.rs
//! File integrity checking.
//!
//! Uses [`crc32fast`] to compute the CRC-32 (IEEE 802.3) checksum that the
//! client compares against its local file. This detects accidental
//! corruption only; it is not a cryptographic integrity mechanism.

use crc32fast::Hasher;

/// Compute the CRC-32 checksum of `bytes`.
///
/// Callers pass exactly the declared content bytes, never the full
/// decrypted buffer, whose tail may still contain padding artifacts.
pub fn checksum(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}
