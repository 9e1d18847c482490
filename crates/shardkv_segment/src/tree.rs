//! Balanced binary search tree in flattened array form.
//!
//! The tree is laid out like a binary heap: the root sits at position 0 and
//! the children of position `i` sit at `2i + 1` and `2i + 2`. Each subtree
//! takes the midpoint of its input range as its root, so the tree is
//! height-balanced and in-order traversal reproduces the input order.
//!
//! ## Node Format
//!
//! Nodes are written in array order, skipping empty positions:
//!
//! ```text
//! | key_len (4) | key (key_len) | start (8) | end (8) | left (8) | right (8) |
//! ```
//!
//! All integers are little-endian. `left` and `right` are the byte offsets
//! of the child nodes relative to the first byte of the tree, or `-1` when
//! the child does not exist. The root is always at offset 0.

use crate::entry::IndexNode;
use crate::error::{SegmentError, SegmentResult};
use std::io::Write;

/// Marker for a missing child in the serialized form.
pub(crate) const NO_CHILD: i64 = -1;

/// A balanced index tree ready to be serialized.
///
/// # Precondition
///
/// The nodes handed to [`BalancedTree::new`] **must** already be sorted
/// ascending by key. This is not checked: the tree is built on the flush and
/// compaction hot path, and unsorted input silently produces a tree that
/// lookups cannot navigate.
#[derive(Debug, Clone)]
pub struct BalancedTree {
    nodes: Vec<IndexNode>,
    /// Array layout; each occupied slot holds an index into `nodes`.
    slots: Vec<Option<usize>>,
}

impl BalancedTree {
    /// Builds the array layout over `nodes`, which must be sorted by key.
    #[must_use]
    pub fn new(nodes: Vec<IndexNode>) -> Self {
        let len = nodes.len();
        let mut tree = Self {
            slots: Vec::with_capacity(len),
            nodes,
        };
        tree.place(0, 0, len);
        tree
    }

    fn place(&mut self, target: usize, lo: usize, hi: usize) {
        if lo >= hi {
            return;
        }

        let mid = lo + (hi - lo - 1) / 2;
        if self.slots.len() <= target {
            self.slots.resize(target + 1, None);
        }
        self.slots[target] = Some(mid);

        self.place(left(target), lo, mid);
        self.place(right(target), mid + 1, hi);
    }

    /// Number of nodes in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the tree has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in array order, skipping empty positions.
    pub fn array_order(&self) -> impl Iterator<Item = &IndexNode> + '_ {
        self.slots.iter().flatten().map(|&idx| &self.nodes[idx])
    }

    /// Serialized size in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        self.nodes.iter().map(|n| n.encoded_len() as u64).sum()
    }

    /// Byte offset of every array position. Empty positions carry the
    /// offset the next node would get; they are never referenced.
    fn disk_offsets(&self) -> SegmentResult<Vec<u64>> {
        let mut offsets = Vec::with_capacity(self.slots.len());
        let mut current = 0u64;
        for slot in &self.slots {
            offsets.push(current);
            if let Some(idx) = slot {
                let node = &self.nodes[*idx];
                if u32::try_from(node.key.len()).is_err() {
                    return Err(SegmentError::KeyTooLarge {
                        len: node.key.len(),
                    });
                }
                current += node.encoded_len() as u64;
            }
        }
        Ok(offsets)
    }

    fn child_offset(&self, offsets: &[u64], pos: usize) -> i64 {
        match self.slots.get(pos) {
            Some(Some(_)) => offsets[pos] as i64,
            _ => NO_CHILD,
        }
    }

    /// Serializes the tree into `w` and returns the number of bytes written.
    ///
    /// An empty tree writes nothing and returns 0.
    ///
    /// # Errors
    ///
    /// Returns an error if a key is longer than `u32::MAX` bytes or if `w`
    /// rejects a write. On error the number of bytes already handed to `w`
    /// is unspecified.
    pub fn write_to<W: Write>(&self, w: &mut W) -> SegmentResult<u64> {
        let offsets = self.disk_offsets()?;
        let mut written = 0u64;

        for (pos, slot) in self.slots.iter().enumerate() {
            let Some(idx) = slot else { continue };
            let node = &self.nodes[*idx];

            let mut buf = Vec::with_capacity(node.encoded_len());
            buf.extend_from_slice(&(node.key.len() as u32).to_le_bytes());
            buf.extend_from_slice(&node.key);
            buf.extend_from_slice(&node.start.to_le_bytes());
            buf.extend_from_slice(&node.end.to_le_bytes());
            buf.extend_from_slice(&self.child_offset(&offsets, left(pos)).to_le_bytes());
            buf.extend_from_slice(&self.child_offset(&offsets, right(pos)).to_le_bytes());

            w.write_all(&buf)?;
            written += buf.len() as u64;
        }

        Ok(written)
    }

    /// Serializes the tree into a new buffer.
    pub fn to_bytes(&self) -> SegmentResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.encoded_len() as usize);
        self.write_to(&mut buf)?;
        Ok(buf)
    }
}

#[inline]
fn left(pos: usize) -> usize {
    2 * pos + 1
}

#[inline]
fn right(pos: usize) -> usize {
    2 * pos + 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn nodes(keys: &[&str]) -> Vec<IndexNode> {
        keys.iter()
            .enumerate()
            .map(|(i, k)| IndexNode::new(*k, i as u64 * 10, i as u64 * 10 + 10))
            .collect()
    }

    #[test]
    fn empty_tree_writes_nothing() {
        let tree = BalancedTree::new(Vec::new());
        assert!(tree.is_empty());
        assert_eq!(tree.to_bytes().unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn midpoint_becomes_root() {
        let tree = BalancedTree::new(nodes(&["a", "b", "c", "d", "e"]));
        let order: Vec<_> = tree.array_order().map(|n| n.key.clone()).collect();
        // root c, children a and d, grandchildren b and e
        assert_eq!(
            order,
            vec![b"c".to_vec(), b"a".to_vec(), b"d".to_vec(), b"b".to_vec(), b"e".to_vec()]
        );
    }

    #[test]
    fn single_node_layout() {
        let tree = BalancedTree::new(vec![IndexNode::new("k", 16, 20)]);
        let bytes = tree.to_bytes().unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&1u32.to_le_bytes());
        expected.push(b'k');
        expected.extend_from_slice(&16u64.to_le_bytes());
        expected.extend_from_slice(&20u64.to_le_bytes());
        expected.extend_from_slice(&(-1i64).to_le_bytes());
        expected.extend_from_slice(&(-1i64).to_le_bytes());

        assert_eq!(bytes, expected);
    }

    #[test]
    fn child_offsets_point_at_children() {
        let tree = BalancedTree::new(nodes(&["a", "b", "c"]));
        let bytes = tree.to_bytes().unwrap();

        // root "b" at 0, each node is 37 bytes
        let left = i64::from_le_bytes(bytes[21..29].try_into().unwrap());
        let right = i64::from_le_bytes(bytes[29..37].try_into().unwrap());
        assert_eq!(left, 37);
        assert_eq!(right, 74);
        assert_eq!(&bytes[41..42], b"a");
        assert_eq!(&bytes[78..79], b"c");
    }

    #[test]
    fn serialization_is_deterministic() {
        let input = nodes(&["apple", "banana", "cherry", "date", "elder", "fig"]);
        let first = BalancedTree::new(input.clone()).to_bytes().unwrap();
        let second = BalancedTree::new(input).to_bytes().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn written_len_matches_encoded_len() {
        let tree = BalancedTree::new(nodes(&["a", "bb", "ccc", "dddd"]));
        let mut sink = Vec::new();
        let n = tree.write_to(&mut sink).unwrap();
        assert_eq!(n, sink.len() as u64);
        assert_eq!(n, tree.encoded_len());
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn sink_failure_is_io_error() {
        let tree = BalancedTree::new(nodes(&["a"]));
        let result = tree.write_to(&mut FailingSink);
        assert!(matches!(result, Err(SegmentError::Io(_))));
    }
}
