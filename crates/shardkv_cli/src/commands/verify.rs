//! Verify command implementation.

use super::display_key;
use shardkv_segment::{BalancedTree, DiskTree, SegmentHeader, SegmentIndexes, SEGMENT_HEADER_SIZE};
use std::fs;
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of indexes checked.
    pub indexes_checked: usize,
    /// Number of nodes checked.
    pub nodes_checked: usize,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying segment at {:?}", path);
    println!();

    let data = fs::read(path)?;
    let result = verify_segment(&data);

    println!("Indexes checked: {}", result.indexes_checked);
    println!("Nodes checked:   {}", result.nodes_checked);
    for error in &result.errors {
        println!("  ✗ {error}");
    }

    println!();
    if result.is_ok() {
        println!("✓ Segment verification passed");
        Ok(())
    } else {
        println!("✗ Segment verification failed");
        Err("Verification failed".into())
    }
}

/// Checks the header and every index of the segment in `data`.
pub fn verify_segment(data: &[u8]) -> VerifyResult {
    let mut result = VerifyResult::default();

    let header = match SegmentHeader::decode(data) {
        Ok(header) => header,
        Err(e) => {
            result.errors.push(format!("header: {e}"));
            return result;
        }
    };

    let Some(start) = usize::try_from(header.index_start)
        .ok()
        .filter(|s| *s >= SEGMENT_HEADER_SIZE as usize && *s <= data.len())
    else {
        result
            .errors
            .push(format!("index start {} outside the file", header.index_start));
        return result;
    };

    let indexes = match SegmentIndexes::parse(&data[start..], header.index_start, header.secondary_indices) {
        Ok(indexes) => indexes,
        Err(e) => {
            result.errors.push(format!("offset table: {e}"));
            return result;
        }
    };

    verify_tree(&mut result, "primary index", indexes.primary(), header.index_start, true);
    for pos in 0..indexes.secondary_count() {
        if let Some(tree) = indexes.secondary(pos) {
            let name = format!("secondary index {pos}");
            verify_tree(&mut result, &name, tree, header.index_start, false);
        }
    }

    result
}

fn verify_tree(result: &mut VerifyResult, name: &str, tree: DiskTree<'_>, values_end: u64, unique: bool) {
    result.indexes_checked += 1;

    let nodes = match tree.nodes() {
        Ok(nodes) => nodes,
        Err(e) => {
            result.errors.push(format!("{name}: {e}"));
            return;
        }
    };
    result.nodes_checked += nodes.len();

    match tree.len() {
        Ok(stored) if stored != nodes.len() => result.errors.push(format!(
            "{name}: {stored} nodes stored but {} reachable",
            nodes.len()
        )),
        Ok(_) => {}
        Err(e) => result.errors.push(format!("{name}: {e}")),
    }

    for pair in nodes.windows(2) {
        let out_of_order = if unique {
            pair[0].key >= pair[1].key
        } else {
            pair[0].key > pair[1].key
        };
        if out_of_order {
            result.errors.push(format!(
                "{name}: key {:?} not in order after {:?}",
                display_key(&pair[1].key),
                display_key(&pair[0].key)
            ));
        }
    }

    for node in &nodes {
        if node.start < SEGMENT_HEADER_SIZE || node.start > node.end || node.end > values_end {
            result.errors.push(format!(
                "{name}: key {:?} points to {}..{} outside the values region",
                display_key(&node.key),
                node.start,
                node.end
            ));
        }
    }

    // a well-formed tree serializes back to exactly the same bytes
    match BalancedTree::new(nodes).to_bytes() {
        Ok(rebuilt) if rebuilt == tree.as_bytes() => {}
        Ok(_) => result
            .errors
            .push(format!("{name}: layout differs from a rebuilt tree")),
        Err(e) => result.errors.push(format!("{name}: {e}")),
    }
}
