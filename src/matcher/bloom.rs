//! Bloom filter fronting the static route index.
//!
//! A miss proves the path is not a static route, which lets the matcher skip
//! the hash lookup entirely. False positives only cost that hash lookup.

use std::hash::{BuildHasher, Hash, Hasher, RandomState};

const BITS_PER_ITEM: usize = 10;
const HASHES: u64 = 7;

pub(crate) struct BloomFilter {
    bits: Vec<u64>,
    mask: u64,
    hasher: RandomState,
}

impl BloomFilter {
    /// Creates a filter sized for `expected` items (about 1% false positives).
    pub(crate) fn with_capacity(expected: usize) -> Self {
        let wanted = (expected.max(1) * BITS_PER_ITEM).next_power_of_two().max(64);
        Self {
            bits: vec![0; wanted / 64],
            mask: wanted as u64 - 1,
            hasher: RandomState::new(),
        }
    }

    pub(crate) fn insert(&mut self, item: &str) {
        let (h1, h2) = self.hashes(item);
        for i in 0..HASHES {
            let bit = h1.wrapping_add(i.wrapping_mul(h2)) & self.mask;
            self.bits[(bit / 64) as usize] |= 1 << (bit % 64);
        }
    }

    /// Returns false only if `item` was never inserted.
    pub(crate) fn may_contain(&self, item: &str) -> bool {
        let (h1, h2) = self.hashes(item);
        (0..HASHES).all(|i| {
            let bit = h1.wrapping_add(i.wrapping_mul(h2)) & self.mask;
            self.bits[(bit / 64) as usize] & (1 << (bit % 64)) != 0
        })
    }

    // Double hashing: derive every probe from two base hashes.
    fn hashes(&self, item: &str) -> (u64, u64) {
        let mut hasher = self.hasher.build_hasher();
        item.hash(&mut hasher);
        let h1 = hasher.finish();
        let h2 = h1.rotate_left(32) | 1;
        (h1, h2)
    }
}
