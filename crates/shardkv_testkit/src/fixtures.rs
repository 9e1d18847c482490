//! Test fixtures for segment index tests.

use shardkv_segment::{KeyEntry, SegmentIndexWriter, SEGMENT_HEADER_SIZE};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory holding the scratch space of one writer.
pub struct ScratchDir {
    temp_dir: TempDir,
}

impl ScratchDir {
    /// Creates a new temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Returns the scratch space path inside the directory. It does not
    /// exist until a writer acquires it.
    pub fn scratch_path(&self) -> PathBuf {
        self.temp_dir.path().join("scratch")
    }

    /// Returns a writer staging into [`Self::scratch_path`].
    pub fn writer(&self, secondary_index_count: u16) -> SegmentIndexWriter {
        SegmentIndexWriter::new(self.scratch_path(), secondary_index_count)
    }
}

impl Default for ScratchDir {
    fn default() -> Self {
        Self::new()
    }
}

/// A written index artifact together with its absolute position.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// The artifact bytes.
    pub bytes: Vec<u8>,
    /// Absolute offset of the artifact in the segment file.
    pub index_start: u64,
}

/// Writes the indexes of `entries` in a fresh scratch directory.
pub fn write_artifact(entries: &[KeyEntry], secondary_index_count: u16) -> Artifact {
    let dir = ScratchDir::new();
    let mut bytes = Vec::new();
    dir.writer(secondary_index_count)
        .write_to(entries, &mut bytes)
        .expect("Failed to write segment indexes");

    Artifact {
        bytes,
        index_start: entries.last().map_or(SEGMENT_HEADER_SIZE, |e| e.value_end),
    }
}

/// Two entries, "a" with secondary key "x" and "c" without one.
pub fn sample_entries() -> Vec<KeyEntry> {
    vec![
        KeyEntry::new("a", 16, 26).with_secondary(0, "x"),
        KeyEntry::new("c", 26, 36),
    ]
}
