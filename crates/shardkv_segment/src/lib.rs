//! # shardkv Segment Indexes
//!
//! Building, persisting and reading the indexes of immutable LSM segments.
//!
//! A segment file is laid out as:
//!
//! ```text
//! | header (16) | values ... | offset table | primary index | secondary indexes ... |
//! ```
//!
//! Each index is a balanced binary search tree flattened into an array, so a
//! lookup walks the serialized bytes without deserializing anything. The
//! primary index is keyed by the record key; each secondary index is keyed by
//! an alternate key and only covers the records that have one.
//!
//! ## Example
//!
//! ```rust
//! use shardkv_segment::{KeyEntry, SegmentIndexWriter, SegmentIndexes};
//!
//! let scratch = std::env::temp_dir().join("shardkv-doc-scratch");
//! let entries = vec![
//!     KeyEntry::new("a", 16, 26).with_secondary(0, "alt-a"),
//!     KeyEntry::new("c", 26, 36),
//! ];
//!
//! let mut artifact = Vec::new();
//! SegmentIndexWriter::new(&scratch, 1)
//!     .write_to(&entries, &mut artifact)
//!     .unwrap();
//!
//! let indexes = SegmentIndexes::parse(&artifact, 36, 1).unwrap();
//! assert!(indexes.primary().get(b"c").unwrap().is_some());
//! assert!(indexes.secondary(0).unwrap().get(b"alt-a").unwrap().is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod disk_tree;
mod entry;
mod error;
mod header;
mod reader;
mod scratch;
mod tree;
mod writer;

pub use disk_tree::DiskTree;
pub use entry::{IndexNode, KeyEntry, NODE_FIXED_SIZE};
pub use error::{SegmentError, SegmentResult};
pub use header::{SegmentHeader, Strategy, SEGMENT_HEADER_SIZE, SEGMENT_VERSION};
pub use reader::SegmentIndexes;
pub use scratch::{ScratchSpace, StagedFile};
pub use tree::BalancedTree;
pub use writer::SegmentIndexWriter;
