//! Splitting an index artifact back into its trees.

use crate::disk_tree::DiskTree;
use crate::error::{SegmentError, SegmentResult};

/// The primary and secondary indexes of one segment.
#[derive(Debug, Clone)]
pub struct SegmentIndexes<'a> {
    index_start: u64,
    primary: DiskTree<'a>,
    secondary: Vec<DiskTree<'a>>,
    secondary_offsets: Vec<u64>,
}

impl<'a> SegmentIndexes<'a> {
    /// Parses an index artifact.
    ///
    /// `artifact` holds the bytes from `index_start` to the end of the
    /// segment file. Offsets in the offset table are absolute file offsets,
    /// so `index_start` is needed to turn them into positions in `artifact`.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::Corrupted`] if the offset table is truncated,
    /// decreasing or points outside the artifact.
    pub fn parse(artifact: &'a [u8], index_start: u64, secondary_index_count: u16) -> SegmentResult<Self> {
        let count = usize::from(secondary_index_count);
        let table_len = count * 8;
        if artifact.len() < table_len {
            return Err(SegmentError::corrupted(format!(
                "offset table needs {table_len} bytes, artifact has {}",
                artifact.len()
            )));
        }

        let mut secondary_offsets = Vec::with_capacity(count);
        let mut bounds = Vec::with_capacity(count + 1);
        for i in 0..count {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&artifact[i * 8..i * 8 + 8]);
            let offset = u64::from_le_bytes(buf);

            let rel = offset
                .checked_sub(index_start)
                .and_then(|r| usize::try_from(r).ok())
                .filter(|r| *r >= table_len && *r <= artifact.len())
                .ok_or_else(|| {
                    SegmentError::corrupted(format!(
                        "secondary index {i} offset {offset} outside the index region"
                    ))
                })?;
            if bounds.last().is_some_and(|prev| rel < *prev) {
                return Err(SegmentError::corrupted(format!(
                    "secondary index {i} offset {offset} precedes the previous index"
                )));
            }

            secondary_offsets.push(offset);
            bounds.push(rel);
        }
        bounds.push(artifact.len());

        let primary_end = bounds[0];
        let primary = DiskTree::new(&artifact[table_len..primary_end]);
        let secondary = bounds
            .windows(2)
            .map(|w| DiskTree::new(&artifact[w[0]..w[1]]))
            .collect();

        Ok(Self {
            index_start,
            primary,
            secondary,
            secondary_offsets,
        })
    }

    /// Absolute offset of the artifact in the segment file.
    #[must_use]
    pub fn index_start(&self) -> u64 {
        self.index_start
    }

    /// The primary index.
    #[must_use]
    pub fn primary(&self) -> DiskTree<'a> {
        self.primary
    }

    /// The secondary index at `pos`.
    #[must_use]
    pub fn secondary(&self, pos: usize) -> Option<DiskTree<'a>> {
        self.secondary.get(pos).copied()
    }

    /// Number of secondary indexes.
    #[must_use]
    pub fn secondary_count(&self) -> usize {
        self.secondary.len()
    }

    /// Absolute offsets from the offset table.
    #[must_use]
    pub fn secondary_offsets(&self) -> &[u64] {
        &self.secondary_offsets
    }
}
