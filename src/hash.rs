//! The single deterministic hash used for every attribute.
//!
//! Stable across platforms and toolchains (xxhash64, seed 0): bucket
//! mapping must not depend on `std::collections::hash_map::RandomState` or
//! any other per-process-random hasher, or the same tuple would land in a
//! different bucket on every run.

use std::hash::Hasher;
use twox_hash::XxHash64;

/// Hash an opaque attribute byte string to a 32-bit value.
///
/// The engine only ever consumes individual bits of the result (via the
/// choice vector), so folding the 64-bit xxhash output down to 32 bits
/// loses nothing the bucket addressing scheme relies on.
#[inline]
pub fn hash_any(bytes: &[u8]) -> u32 {
    let mut h = XxHash64::with_seed(0);
    h.write(bytes);
    let full = h.finish();
    (full ^ (full >> 32)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(hash_any(b"hello"), hash_any(b"hello"));
        assert_ne!(hash_any(b"hello"), hash_any(b"world"));
    }

    #[test]
    fn empty_is_stable() {
        assert_eq!(hash_any(b""), hash_any(b""));
    }
}
