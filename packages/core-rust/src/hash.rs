//! FNV-1a hash utilities for MerkleTree bucket routing.
//!
//! Provides a 32-bit FNV-1a hash that iterates over UTF-16 code units to match
//! the TypeScript `String.charCodeAt()` behavior, ensuring identical hashes
//! across Rust and TypeScript for cross-language MerkleTree synchronization.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Computes the 32-bit FNV-1a hash of a string, iterating over UTF-16 code
/// units rather than UTF-8 bytes.
///
/// For ASCII-only strings this is identical to byte-wise FNV-1a, since each
/// UTF-16 code unit and UTF-8 byte coincide. Non-ASCII input diverges, which
/// is the point: this must match the TS client's `charCodeAt()`-based hash.
///
/// # Examples
///
/// ```
/// use topgun_core::hash::fnv1a_hash;
///
/// assert_eq!(fnv1a_hash(""), 2_166_136_261);
/// assert_eq!(fnv1a_hash("hello"), 1_335_831_723);
/// ```
#[must_use]
pub fn fnv1a_hash(s: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for unit in s.encode_utf16() {
        hash ^= u32::from(unit);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Combines a sequence of hashes into one, used to fold child bucket hashes
/// up into a parent's hash in the `MerkleTree`.
///
/// Returns `0` for an empty slice, matching an empty bucket's root hash.
/// Order-sensitive: callers must present hashes in a canonical order (e.g.
/// sorted by key or by bucket digit) for the result to be deterministic
/// across replicas.
#[must_use]
pub fn combine_hashes(hashes: &[u32]) -> u32 {
    if hashes.is_empty() {
        return 0;
    }
    let mut acc = FNV_OFFSET_BASIS;
    for &h in hashes {
        acc ^= h;
        acc = acc.wrapping_mul(FNV_PRIME);
    }
    acc
}
