//! Inspect command implementation.

use super::display_key;
use serde::Serialize;
use shardkv_segment::{DiskTree, SegmentHeader, SegmentIndexes, SEGMENT_HEADER_SIZE};
use std::fs;
use std::path::Path;

/// Segment inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Segment path.
    pub path: String,
    /// File size in bytes.
    pub file_size: u64,
    /// Compaction level.
    pub level: u16,
    /// Format version.
    pub version: u16,
    /// Value layout.
    pub strategy: String,
    /// Size of the values region in bytes.
    pub values_size: u64,
    /// Offset of the index artifact.
    pub index_start: u64,
    /// The primary index.
    pub primary: IndexSummary,
    /// Secondary indexes by position.
    pub secondary: Vec<IndexSummary>,
}

/// Summary of one index.
#[derive(Debug, Serialize)]
pub struct IndexSummary {
    /// Absolute offset of the index, for secondary indexes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    /// Serialized size in bytes.
    pub size: usize,
    /// Number of nodes.
    pub entries: usize,
    /// Smallest key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_key: Option<String>,
    /// Largest key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_key: Option<String>,
    /// Every key in order (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
}

impl IndexSummary {
    fn from_tree(
        tree: DiskTree<'_>,
        offset: Option<u64>,
        show_keys: bool,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let keys: Vec<String> = tree.all_keys()?.iter().map(|k| display_key(k)).collect();
        Ok(Self {
            offset,
            size: tree.size(),
            entries: keys.len(),
            first_key: keys.first().cloned(),
            last_key: keys.last().cloned(),
            keys: show_keys.then_some(keys),
        })
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, show_keys: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No segment found at {:?}", path).into());
    }

    let data = fs::read(path)?;
    let result = inspect(path, &data, show_keys)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Decodes the header and indexes of the segment in `data`.
pub fn inspect(
    path: &Path,
    data: &[u8],
    show_keys: bool,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let header = SegmentHeader::decode(data)?;
    let start = usize::try_from(header.index_start)
        .ok()
        .filter(|s| *s >= SEGMENT_HEADER_SIZE as usize && *s <= data.len())
        .ok_or_else(|| format!("index start {} outside the file", header.index_start))?;

    let indexes = SegmentIndexes::parse(&data[start..], header.index_start, header.secondary_indices)?;

    let primary = IndexSummary::from_tree(indexes.primary(), None, show_keys)?;
    let mut secondary = Vec::with_capacity(indexes.secondary_count());
    for (pos, offset) in indexes.secondary_offsets().iter().enumerate() {
        let tree = indexes
            .secondary(pos)
            .ok_or_else(|| format!("secondary index {pos} missing"))?;
        secondary.push(IndexSummary::from_tree(tree, Some(*offset), show_keys)?);
    }

    Ok(InspectResult {
        path: path.display().to_string(),
        file_size: data.len() as u64,
        level: header.level,
        version: header.version,
        strategy: format!("{:?}", header.strategy),
        values_size: header.index_start - SEGMENT_HEADER_SIZE,
        index_start: header.index_start,
        primary,
        secondary,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("shardkv Segment Inspection");
    println!("==========================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Header:");
    println!("  Level:       {}", result.level);
    println!("  Version:     {}", result.version);
    println!("  Strategy:    {}", result.strategy);
    println!("  Index start: {}", result.index_start);
    println!();
    println!("Storage:");
    println!("  File size:   {}", format_size(result.file_size));
    println!("  Values size: {}", format_size(result.values_size));
    println!();
    println!("Primary index:");
    print_index(&result.primary);

    for (pos, index) in result.secondary.iter().enumerate() {
        println!();
        println!(
            "Secondary index {} (offset {}):",
            pos,
            index.offset.unwrap_or_default()
        );
        print_index(index);
    }
}

fn print_index(index: &IndexSummary) {
    println!("  Entries: {}", index.entries);
    println!("  Size:    {}", format_size(index.size as u64));
    if let (Some(first), Some(last)) = (&index.first_key, &index.last_key) {
        println!("  Range:   {first:?} .. {last:?}");
    }
    if let Some(keys) = &index.keys {
        for key in keys {
            println!("    {key}");
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
