//! Read-only view over a serialized [`crate::BalancedTree`].
//!
//! Lookups walk the tree directly on the serialized bytes by following the
//! child offsets stored in each node; nothing is deserialized up front.

use crate::entry::{IndexNode, NODE_FIXED_SIZE};
use crate::error::{SegmentError, SegmentResult};
use crate::tree::NO_CHILD;
use std::cmp::Ordering;

/// A serialized balanced tree.
#[derive(Debug, Clone, Copy)]
pub struct DiskTree<'a> {
    data: &'a [u8],
}

struct DiskNode<'a> {
    key: &'a [u8],
    start: u64,
    end: u64,
    left: Option<usize>,
    right: Option<usize>,
}

impl DiskNode<'_> {
    fn to_index_node(&self) -> IndexNode {
        IndexNode::new(self.key, self.start, self.end)
    }
}

impl<'a> DiskTree<'a> {
    /// Wraps the serialized bytes of one tree.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Size of the serialized tree in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// The serialized bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Returns true if the tree has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn read_u64(&self, pos: usize) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.data[pos..pos + 8]);
        u64::from_le_bytes(buf)
    }

    fn read_node(&self, offset: usize) -> SegmentResult<DiskNode<'a>> {
        if self.data.len() < offset + 4 {
            return Err(SegmentError::corrupted(format!(
                "truncated key length at offset {offset}"
            )));
        }
        let key_len = u32::from_le_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]) as usize;

        let node_end = offset + NODE_FIXED_SIZE + key_len;
        if self.data.len() < node_end {
            return Err(SegmentError::corrupted(format!(
                "truncated node at offset {offset}"
            )));
        }

        let key_start = offset + 4;
        let mut pos = key_start + key_len;
        let start = self.read_u64(pos);
        pos += 8;
        let end = self.read_u64(pos);
        pos += 8;
        let left = self.child(offset, self.read_u64(pos) as i64)?;
        pos += 8;
        let right = self.child(offset, self.read_u64(pos) as i64)?;

        Ok(DiskNode {
            key: &self.data[key_start..key_start + key_len],
            start,
            end,
            left,
            right,
        })
    }

    /// Children always follow their parent in array order, so a child
    /// offset at or before the parent can only come from corruption.
    fn child(&self, parent: usize, raw: i64) -> SegmentResult<Option<usize>> {
        if raw == NO_CHILD {
            return Ok(None);
        }
        match usize::try_from(raw) {
            Ok(offset) if offset > parent && offset < self.data.len() => Ok(Some(offset)),
            _ => Err(SegmentError::corrupted(format!(
                "invalid child offset {raw} in node at {parent}"
            ))),
        }
    }

    fn root(&self) -> Option<usize> {
        (!self.data.is_empty()).then_some(0)
    }

    /// Exact-match lookup.
    pub fn get(&self, key: &[u8]) -> SegmentResult<Option<IndexNode>> {
        let mut next = self.root();
        while let Some(offset) = next {
            let node = self.read_node(offset)?;
            next = match key.cmp(node.key) {
                Ordering::Equal => return Ok(Some(node.to_index_node())),
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
            };
        }
        Ok(None)
    }

    /// Returns the node with the smallest key that is `>= key`.
    pub fn seek(&self, key: &[u8]) -> SegmentResult<Option<IndexNode>> {
        let mut best = None;
        let mut next = self.root();
        while let Some(offset) = next {
            let node = self.read_node(offset)?;
            next = match key.cmp(node.key) {
                Ordering::Equal => return Ok(Some(node.to_index_node())),
                Ordering::Less => {
                    best = Some(node.to_index_node());
                    node.left
                }
                Ordering::Greater => node.right,
            };
        }
        Ok(best)
    }

    /// All nodes in key order.
    pub fn nodes(&self) -> SegmentResult<Vec<IndexNode>> {
        let mut out = Vec::new();
        let mut stack: Vec<DiskNode<'a>> = Vec::new();
        let mut next = self.root();

        loop {
            while let Some(offset) = next {
                let node = self.read_node(offset)?;
                next = node.left;
                stack.push(node);
            }
            let Some(node) = stack.pop() else { break };
            out.push(node.to_index_node());
            next = node.right;
        }

        Ok(out)
    }

    /// All keys in order.
    pub fn all_keys(&self) -> SegmentResult<Vec<Vec<u8>>> {
        Ok(self.nodes()?.into_iter().map(|n| n.key).collect())
    }

    /// Number of nodes, counted by scanning the contiguous node records.
    pub fn len(&self) -> SegmentResult<usize> {
        let mut offset = 0;
        let mut count = 0;
        while offset < self.data.len() {
            let node = self.read_node(offset)?;
            offset += NODE_FIXED_SIZE + node.key.len();
            count += 1;
        }
        Ok(count)
    }
}
