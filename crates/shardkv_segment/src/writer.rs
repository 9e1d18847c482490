//! Segment index writer.
//!
//! Builds the primary index and every secondary index of a segment and
//! writes them out as one artifact:
//!
//! ```text
//! | offsets (8 × N) | primary index | secondary 0 | ... | secondary N-1 |
//! ```
//!
//! The artifact is appended to the segment file right after the values, so
//! the offset baseline is the end of the last value (or the header size for
//! an empty segment). Each entry of the offset table is the absolute file
//! offset of one secondary index, little-endian.
//!
//! ## Failure Model
//!
//! Any failure aborts the write and is returned. Bytes already handed to the
//! destination are not rolled back: making the destination atomic (for
//! example write-then-rename) is the caller's job. The scratch space only
//! keeps the serialized trees off the heap.

use crate::entry::{IndexNode, KeyEntry};
use crate::error::SegmentResult;
use crate::header::SEGMENT_HEADER_SIZE;
use crate::scratch::ScratchSpace;
use crate::tree::BalancedTree;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

const PRIMARY_FILE: &str = "primary";
const SECONDARY_FILE: &str = "secondary";

/// Writes the index artifact of one segment.
///
/// # Example
///
/// ```no_run
/// use shardkv_segment::{KeyEntry, SegmentIndexWriter};
/// use std::path::Path;
///
/// let entries = vec![KeyEntry::new("a", 16, 26), KeyEntry::new("c", 26, 36)];
/// let writer = SegmentIndexWriter::new(Path::new("/data/shard/.scratch"), 0);
///
/// let mut out = Vec::new();
/// let written = writer.write_to(&entries, &mut out).unwrap();
/// assert_eq!(written, out.len() as u64);
/// ```
#[derive(Debug, Clone)]
pub struct SegmentIndexWriter {
    scratch_space_path: PathBuf,
    secondary_index_count: u16,
}

impl SegmentIndexWriter {
    /// Creates a writer that stages through `scratch_space_path`.
    ///
    /// The path must not be shared with another writer running at the same
    /// time.
    pub fn new(scratch_space_path: impl Into<PathBuf>, secondary_index_count: u16) -> Self {
        Self {
            scratch_space_path: scratch_space_path.into(),
            secondary_index_count,
        }
    }

    /// Returns the scratch space path.
    #[must_use]
    pub fn scratch_space_path(&self) -> &Path {
        &self.scratch_space_path
    }

    /// Returns the number of secondary indexes written.
    #[must_use]
    pub fn secondary_index_count(&self) -> u16 {
        self.secondary_index_count
    }

    /// Builds all indexes over `entries` and writes the artifact to `w`.
    ///
    /// `entries` must be sorted by primary key; secondary keys may come in
    /// any order. Returns the total number of bytes written.
    pub fn write_to<W: Write>(&self, entries: &[KeyEntry], w: &mut W) -> SegmentResult<u64> {
        let mut current_offset = entries
            .last()
            .map_or(SEGMENT_HEADER_SIZE, |last| last.value_end);

        let mut scratch = ScratchSpace::acquire(&self.scratch_space_path)?;

        let mut primary = scratch.create_file(PRIMARY_FILE)?;
        let primary_len = build_primary(entries, &mut primary).inspect_err(|e| {
            error!(scratch_space = %self.scratch_space_path.display(), error = %e, "building primary index failed");
        })?;
        let mut primary = primary.finish()?;

        // the offset table sits in front of the secondary indexes
        current_offset += primary_len + u64::from(self.secondary_index_count) * 8;

        let mut secondary = scratch.create_file(SECONDARY_FILE)?;
        let mut offsets = Vec::with_capacity(usize::from(self.secondary_index_count));
        for pos in 0..usize::from(self.secondary_index_count) {
            let n = build_secondary(entries, pos, &mut secondary).inspect_err(|e| {
                error!(
                    scratch_space = %self.scratch_space_path.display(),
                    position = pos,
                    error = %e,
                    "building secondary index failed"
                );
            })?;
            offsets.push(current_offset);
            current_offset += n;
        }
        let mut secondary = secondary.finish()?;

        let mut written = 0u64;
        for offset in &offsets {
            w.write_all(&offset.to_le_bytes())?;
        }
        written += offsets.len() as u64 * 8;

        written += io::copy(&mut primary, w)?;
        written += io::copy(&mut secondary, w)?;

        drop(primary);
        drop(secondary);
        scratch.release()?;

        debug!(
            entries = entries.len(),
            primary_bytes = primary_len,
            secondary_indexes = self.secondary_index_count,
            bytes = written,
            "wrote segment indexes"
        );

        Ok(written)
    }
}

/// Entries are already sorted by primary key and are not sorted again.
fn build_primary<W: Write>(entries: &[KeyEntry], w: &mut W) -> SegmentResult<u64> {
    let nodes = entries
        .iter()
        .map(|e| IndexNode::new(e.key.clone(), e.value_start, e.value_end))
        .collect();
    BalancedTree::new(nodes).write_to(w)
}

/// Entries without a key at `pos` are skipped; the rest are sorted by their
/// secondary key.
fn build_secondary<W: Write>(entries: &[KeyEntry], pos: usize, w: &mut W) -> SegmentResult<u64> {
    let mut nodes: Vec<IndexNode> = entries
        .iter()
        .filter_map(|e| {
            e.secondary(pos)
                .map(|key| IndexNode::new(key, e.value_start, e.value_end))
        })
        .collect();
    nodes.sort_by(|a, b| a.key.cmp(&b.key));
    BalancedTree::new(nodes).write_to(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk_tree::DiskTree;
    use tempfile::tempdir;

    fn read_offsets(artifact: &[u8], count: usize) -> Vec<u64> {
        (0..count)
            .map(|i| u64::from_le_bytes(artifact[i * 8..i * 8 + 8].try_into().unwrap()))
            .collect()
    }

    #[test]
    fn primary_only_artifact() {
        let temp = tempdir().unwrap();
        let writer = SegmentIndexWriter::new(temp.path().join("scratch"), 0);
        let entries = vec![KeyEntry::new("a", 0, 10), KeyEntry::new("c", 10, 20)];

        let mut out = Vec::new();
        let n = writer.write_to(&entries, &mut out).unwrap();

        assert_eq!(n, out.len() as u64);
        let tree = DiskTree::new(&out);
        assert_eq!(tree.len().unwrap(), 2);
        assert_eq!(tree.all_keys().unwrap(), vec![b"a".to_vec(), b"c".to_vec()]);
        assert!(!temp.path().join("scratch").exists());
    }

    #[test]
    fn empty_entries_without_secondaries() {
        let temp = tempdir().unwrap();
        let writer = SegmentIndexWriter::new(temp.path().join("scratch"), 0);

        let mut out = Vec::new();
        let n = writer.write_to(&[], &mut out).unwrap();
        assert_eq!(n, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn empty_entries_with_secondaries_point_past_table() {
        let temp = tempdir().unwrap();
        let writer = SegmentIndexWriter::new(temp.path().join("scratch"), 3);

        let mut out = Vec::new();
        writer.write_to(&[], &mut out).unwrap();

        assert_eq!(out.len(), 24);
        let expected = SEGMENT_HEADER_SIZE + 24;
        assert_eq!(read_offsets(&out, 3), vec![expected; 3]);
    }

    #[test]
    fn offsets_locate_secondary_indexes() {
        let temp = tempdir().unwrap();
        let writer = SegmentIndexWriter::new(temp.path().join("scratch"), 2);
        let base = 100u64;
        let entries = vec![
            KeyEntry::new("k1", base, base + 5)
                .with_secondary(0, "zeta")
                .with_secondary(1, "one"),
            KeyEntry::new("k2", base + 5, base + 9).with_secondary(0, "alpha"),
            KeyEntry::new("k3", base + 9, base + 20)
                .with_secondary(0, "mid")
                .with_secondary(1, "three"),
        ];

        let mut out = Vec::new();
        writer.write_to(&entries, &mut out).unwrap();

        let index_start = base + 20;
        let offsets = read_offsets(&out, 2);
        let rel: Vec<usize> = offsets.iter().map(|o| (o - index_start) as usize).collect();

        let first = DiskTree::new(&out[rel[0]..rel[1]]);
        assert_eq!(
            first.all_keys().unwrap(),
            vec![b"alpha".to_vec(), b"mid".to_vec(), b"zeta".to_vec()]
        );
        assert_eq!(first.get(b"alpha").unwrap().unwrap().start, base + 5);

        let second = DiskTree::new(&out[rel[1]..]);
        assert_eq!(
            second.all_keys().unwrap(),
            vec![b"one".to_vec(), b"three".to_vec()]
        );

        let primary = DiskTree::new(&out[16..rel[0]]);
        assert_eq!(primary.len().unwrap(), 3);
    }

    #[test]
    fn stale_scratch_space_is_replaced() {
        let temp = tempdir().unwrap();
        let scratch = temp.path().join("scratch");
        std::fs::create_dir_all(&scratch).unwrap();
        std::fs::write(scratch.join("primary"), b"leftover from crash").unwrap();

        let writer = SegmentIndexWriter::new(&scratch, 0);
        let mut out = Vec::new();
        writer
            .write_to(&[KeyEntry::new("a", 16, 17)], &mut out)
            .unwrap();

        assert_eq!(DiskTree::new(&out).len().unwrap(), 1);
        assert!(!scratch.exists());
    }

    struct BrokenDestination;

    impl Write for BrokenDestination {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn destination_failure_propagates_and_cleans_up() {
        let temp = tempdir().unwrap();
        let scratch = temp.path().join("scratch");
        let writer = SegmentIndexWriter::new(&scratch, 1);

        let entries = vec![KeyEntry::new("a", 16, 17).with_secondary(0, "x")];
        let result = writer.write_to(&entries, &mut BrokenDestination);

        assert!(result.is_err());
        assert!(!scratch.exists());
    }
}
