//! Property-based test generators using proptest.
//!
//! Generated entries always satisfy what the segment index writer expects:
//! unique primary keys in ascending order and contiguous value ranges
//! starting right after the segment header.

use proptest::prelude::*;
use shardkv_segment::{KeyEntry, SEGMENT_HEADER_SIZE};

/// Strategy for generating index keys.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..24)
}

/// Strategy for generating segment entries with `secondary_count` sparse
/// secondary keys each.
///
/// Every secondary slot is independently present or absent, so some
/// secondary indexes end up covering only part of the entries (or none).
pub fn key_entries_strategy(
    max_entries: usize,
    secondary_count: usize,
) -> impl Strategy<Value = Vec<KeyEntry>> {
    prop::collection::btree_map(
        key_strategy(),
        (
            1u64..512,
            prop::collection::vec(prop::option::of(key_strategy()), secondary_count),
        ),
        0..max_entries,
    )
    .prop_map(|rows| {
        let mut offset = SEGMENT_HEADER_SIZE;
        rows.into_iter()
            .map(|(key, (value_len, secondary_keys))| {
                let start = offset;
                offset += value_len;
                let mut entry = KeyEntry::new(key, start, offset);
                entry.secondary_keys = secondary_keys;
                entry
            })
            .collect()
    })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    ///
    /// Every case touches the filesystem through the scratch space, so index
    /// tests use this one.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
