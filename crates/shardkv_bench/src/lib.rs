//! Benchmark utilities.

use rand::Rng;
use shardkv_segment::{IndexNode, KeyEntry, SEGMENT_HEADER_SIZE};

/// Generate a random key of the specified size.
pub fn random_key(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate `count` sorted index nodes with 16-byte keys.
pub fn sorted_nodes(count: usize) -> Vec<IndexNode> {
    let mut keys: Vec<Vec<u8>> = (0..count).map(|_| random_key(16)).collect();
    keys.sort();
    keys.dedup();
    keys.into_iter()
        .enumerate()
        .map(|(i, key)| IndexNode::new(key, i as u64 * 100, i as u64 * 100 + 100))
        .collect()
}

/// Generate `count` sorted entries, each with a key for every one of
/// `secondary_count` secondary indexes.
pub fn generate_entries(count: usize, secondary_count: usize) -> Vec<KeyEntry> {
    let mut offset = SEGMENT_HEADER_SIZE;
    sorted_nodes(count)
        .into_iter()
        .map(|node| {
            let start = offset;
            offset += 100;
            let mut entry = KeyEntry::new(node.key, start, offset);
            for pos in 0..secondary_count {
                entry = entry.with_secondary(pos, random_key(12));
            }
            entry
        })
        .collect()
}
