//! Seeded, byte-precise hashing of identifier sequences.
//!
//! Node histories and identity keys hash the raw id stream through
//! [`rustc_hash::FxHasher`] with a fixed per-kind seed, so two values are
//! equal exactly when their id sequences are equal, and hashes are stable
//! across process runs. Every key kind gets its own seed so keys of
//! different kinds never collide by construction.

use std::hash::Hasher;

use rustc_hash::FxHasher;

pub type HashValue = u64;

/// Seed for node histories of the ordinary game tree.
pub const TREE_SEED: u64 = 1412914847;
/// Seed for node histories of gadget-specialized nodes.
pub const GADGET_SEED: u64 = 2862933555;
/// Seed for action-observation history keys.
pub const AOH_SEED: u64 = 3037000499;
/// Seed for public-state keys.
pub const PUBLIC_STATE_SEED: u64 = 2654435769;
/// Seed for action-sequence keys.
pub const SEQUENCE_SEED: u64 = 2246822519;

/// Hash a sequence of 32-bit identifiers with the given seed.
pub fn hash_ids(seed: u64, ids: &[u32]) -> HashValue {
    let mut hasher = FxHasher::default();
    hasher.write_u64(seed);
    for &id in ids {
        hasher.write_u32(id);
    }
    hasher.finish()
}

/// Hash a stream of 64-bit values with the given seed. Used for composite
/// keys whose elements are themselves hashes.
pub fn hash_u64s(seed: u64, values: impl IntoIterator<Item = u64>) -> HashValue {
    let mut hasher = FxHasher::default();
    hasher.write_u64(seed);
    for v in values {
        hasher.write_u64(v);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let ids = [1u32, 2, 3];
        assert_eq!(hash_ids(TREE_SEED, &ids), hash_ids(TREE_SEED, &ids));
        assert_eq!(
            hash_u64s(SEQUENCE_SEED, [7, 8]),
            hash_u64s(SEQUENCE_SEED, [7, 8])
        );
    }

    #[test]
    fn test_seed_changes_hash() {
        let ids = [1u32, 2, 3];
        assert_ne!(hash_ids(TREE_SEED, &ids), hash_ids(GADGET_SEED, &ids));
        assert_ne!(hash_ids(AOH_SEED, &ids), hash_ids(PUBLIC_STATE_SEED, &ids));
    }

    #[test]
    fn test_order_and_length_sensitivity() {
        assert_ne!(hash_ids(TREE_SEED, &[1, 2]), hash_ids(TREE_SEED, &[2, 1]));
        assert_ne!(hash_ids(TREE_SEED, &[1]), hash_ids(TREE_SEED, &[1, 0]));
        assert_ne!(hash_ids(TREE_SEED, &[]), hash_ids(TREE_SEED, &[0]));
    }
}
