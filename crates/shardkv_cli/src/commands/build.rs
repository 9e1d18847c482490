//! Build command implementation.

use serde::Deserialize;
use shardkv_segment::{KeyEntry, SegmentHeader, SegmentIndexWriter, Strategy, SEGMENT_HEADER_SIZE};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Description of a segment to build.
#[derive(Debug, Deserialize)]
pub struct BuildInput {
    /// Number of secondary indexes.
    #[serde(default)]
    pub secondary_index_count: u16,
    /// Entries in any order.
    pub entries: Vec<InputEntry>,
}

/// One entry of a [`BuildInput`].
#[derive(Debug, Deserialize)]
pub struct InputEntry {
    /// Primary key.
    pub key: String,
    /// Secondary keys by position; `null` for none.
    #[serde(default)]
    pub secondary_keys: Vec<Option<String>>,
    /// The value stored in the segment.
    pub value: String,
}

/// Problems with the input file.
#[derive(Debug, Error)]
pub enum InputError {
    /// Two entries share a primary key.
    #[error("duplicate key: {0:?}")]
    DuplicateKey(String),

    /// An entry has more secondary keys than the segment has indexes.
    #[error("entry {key:?} has {given} secondary keys but the segment has {count} secondary indexes")]
    TooManySecondaryKeys {
        /// The entry key.
        key: String,
        /// Secondary keys given.
        given: usize,
        /// Secondary indexes in the segment.
        count: u16,
    },
}

/// What was written.
#[derive(Debug)]
pub struct BuildSummary {
    /// Number of entries.
    pub entries: usize,
    /// Offset of the index artifact.
    pub index_start: u64,
    /// Size of the index artifact in bytes.
    pub index_bytes: u64,
}

/// Runs the build command.
pub fn run(
    input: &Path,
    output: &Path,
    scratch: Option<PathBuf>,
    level: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let input: BuildInput = serde_json::from_slice(&fs::read(input)?)?;
    let scratch = scratch.unwrap_or_else(|| default_scratch_path(output));

    let summary = build_segment(&input, output, &scratch, level)?;

    println!("Wrote {}", output.display());
    println!("  Entries:           {}", summary.entries);
    println!("  Secondary indexes: {}", input.secondary_index_count);
    println!("  Index start:       {}", summary.index_start);
    println!("  Index size:        {} bytes", summary.index_bytes);
    Ok(())
}

/// `<output>.scratch.d`, next to the segment.
pub fn default_scratch_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(".scratch.d");
    PathBuf::from(name)
}

/// Writes header, values and indexes of `input` to `output`.
pub fn build_segment(
    input: &BuildInput,
    output: &Path,
    scratch: &Path,
    level: u16,
) -> Result<BuildSummary, Box<dyn std::error::Error>> {
    let mut rows: Vec<&InputEntry> = input.entries.iter().collect();
    rows.sort_by(|a, b| a.key.as_bytes().cmp(b.key.as_bytes()));
    for pair in rows.windows(2) {
        if pair[0].key == pair[1].key {
            return Err(InputError::DuplicateKey(pair[0].key.clone()).into());
        }
    }

    let mut out = BufWriter::new(File::create(output)?);
    // placeholder until index_start is known
    let mut header = SegmentHeader::new(Strategy::Replace, input.secondary_index_count, 0);
    header.level = level;
    header.write_to(&mut out)?;

    let mut entries = Vec::with_capacity(rows.len());
    let mut offset = SEGMENT_HEADER_SIZE;
    for row in rows {
        if row.secondary_keys.len() > usize::from(input.secondary_index_count) {
            return Err(InputError::TooManySecondaryKeys {
                key: row.key.clone(),
                given: row.secondary_keys.len(),
                count: input.secondary_index_count,
            }
            .into());
        }

        out.write_all(row.value.as_bytes())?;
        let start = offset;
        offset += row.value.len() as u64;

        let mut entry = KeyEntry::new(row.key.as_bytes(), start, offset);
        for (pos, key) in row.secondary_keys.iter().enumerate() {
            if let Some(key) = key {
                entry = entry.with_secondary(pos, key.as_bytes());
            }
        }
        entries.push(entry);
    }
    debug!(entries = entries.len(), values_end = offset, "wrote values");

    let writer = SegmentIndexWriter::new(scratch, input.secondary_index_count);
    let index_bytes = writer.write_to(&entries, &mut out)?;

    let mut file = out.into_inner()?;
    header.index_start = offset;
    file.seek(SeekFrom::Start(0))?;
    header.write_to(&mut file)?;
    file.sync_all()?;

    info!(path = %output.display(), entries = entries.len(), index_bytes, "segment written");

    Ok(BuildSummary {
        entries: entries.len(),
        index_start: offset,
        index_bytes,
    })
}
