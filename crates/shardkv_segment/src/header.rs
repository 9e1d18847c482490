//! Segment file header.
//!
//! ```text
//! | level (2) | version (2) | secondary_indices (2) | strategy (2) | index_start (8) |
//! ```
//!
//! All fields are little-endian. The values region starts right after the
//! header and the index artifact starts at `index_start`.

use crate::error::{SegmentError, SegmentResult};
use std::io::Write;

/// Size of the encoded header, and the index baseline of an empty segment.
pub const SEGMENT_HEADER_SIZE: u64 = 16;

/// Current segment format version.
pub const SEGMENT_VERSION: u16 = 0;

/// Value layout of a segment.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One value per key, later writes replace earlier ones.
    Replace = 0,
    /// Unordered set of values per key.
    SetCollection = 1,
    /// Map of values per key.
    MapCollection = 2,
    /// Roaring bitmap per key.
    RoaringSet = 3,
}

impl TryFrom<u16> for Strategy {
    type Error = SegmentError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Strategy::Replace),
            1 => Ok(Strategy::SetCollection),
            2 => Ok(Strategy::MapCollection),
            3 => Ok(Strategy::RoaringSet),
            _ => Err(SegmentError::corrupted(format!("unknown strategy: {value}"))),
        }
    }
}

/// Header at the start of every segment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Compaction level.
    pub level: u16,
    /// Format version.
    pub version: u16,
    /// Number of secondary indexes in the index artifact.
    pub secondary_indices: u16,
    /// Value layout.
    pub strategy: Strategy,
    /// Absolute offset of the index artifact.
    pub index_start: u64,
}

impl SegmentHeader {
    /// Creates a level-0 header for the current format version.
    #[must_use]
    pub fn new(strategy: Strategy, secondary_indices: u16, index_start: u64) -> Self {
        Self {
            level: 0,
            version: SEGMENT_VERSION,
            secondary_indices,
            strategy,
            index_start,
        }
    }

    /// Encodes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; SEGMENT_HEADER_SIZE as usize] {
        let mut buf = [0u8; SEGMENT_HEADER_SIZE as usize];
        buf[0..2].copy_from_slice(&self.level.to_le_bytes());
        buf[2..4].copy_from_slice(&self.version.to_le_bytes());
        buf[4..6].copy_from_slice(&self.secondary_indices.to_le_bytes());
        buf[6..8].copy_from_slice(&(self.strategy as u16).to_le_bytes());
        buf[8..16].copy_from_slice(&self.index_start.to_le_bytes());
        buf
    }

    /// Writes the encoded header to `w`.
    pub fn write_to<W: Write>(&self, w: &mut W) -> SegmentResult<u64> {
        w.write_all(&self.encode())?;
        Ok(SEGMENT_HEADER_SIZE)
    }

    /// Decodes a header from the start of `data`.
    pub fn decode(data: &[u8]) -> SegmentResult<Self> {
        if data.len() < SEGMENT_HEADER_SIZE as usize {
            return Err(SegmentError::corrupted(format!(
                "segment header needs {SEGMENT_HEADER_SIZE} bytes, got {}",
                data.len()
            )));
        }

        let u16_at = |pos: usize| u16::from_le_bytes([data[pos], data[pos + 1]]);
        let mut index_start = [0u8; 8];
        index_start.copy_from_slice(&data[8..16]);

        let version = u16_at(2);
        if version != SEGMENT_VERSION {
            return Err(SegmentError::corrupted(format!(
                "unsupported segment version: {version}"
            )));
        }

        Ok(Self {
            level: u16_at(0),
            version,
            secondary_indices: u16_at(4),
            strategy: Strategy::try_from(u16_at(6))?,
            index_start: u64::from_le_bytes(index_start),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_little_endian() {
        let header = SegmentHeader {
            level: 3,
            version: SEGMENT_VERSION,
            secondary_indices: 2,
            strategy: Strategy::MapCollection,
            index_start: 0x0102,
        };
        let bytes = header.encode();
        assert_eq!(&bytes[0..2], &[3, 0]);
        assert_eq!(&bytes[4..6], &[2, 0]);
        assert_eq!(&bytes[6..8], &[2, 0]);
        assert_eq!(&bytes[8..10], &[0x02, 0x01]);
        assert_eq!(SegmentHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn truncated_header_rejected() {
        let result = SegmentHeader::decode(&[0u8; 10]);
        assert!(matches!(result, Err(SegmentError::Corrupted { .. })));
    }

    #[test]
    fn unknown_strategy_rejected() {
        let mut bytes = SegmentHeader::new(Strategy::Replace, 0, 16).encode();
        bytes[6] = 42;
        assert!(SegmentHeader::decode(&bytes).is_err());
    }
}
