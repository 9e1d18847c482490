//! Records that feed index construction.

/// One record of a segment as seen by the index writer.
///
/// `key` is the primary key, `secondary_keys` holds one slot per configured
/// secondary index and `value_start..value_end` is the byte range of the
/// record's value inside the segment file.
///
/// # Invariants
///
/// - `value_start <= value_end`
/// - When passed to [`crate::SegmentIndexWriter`], entries are sorted
///   ascending by `key` (byte-lexicographic)
/// - Secondary keys are sparse: a slot may be `None`, and the vector may be
///   shorter than the configured secondary index count (for example a delete
///   issued by primary key only)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyEntry {
    /// Primary key.
    pub key: Vec<u8>,
    /// Alternate lookup keys, indexed by secondary index position.
    pub secondary_keys: Vec<Option<Vec<u8>>>,
    /// First byte of the value.
    pub value_start: u64,
    /// One past the last byte of the value.
    pub value_end: u64,
}

impl KeyEntry {
    /// Creates an entry without secondary keys.
    pub fn new(key: impl Into<Vec<u8>>, value_start: u64, value_end: u64) -> Self {
        debug_assert!(value_start <= value_end);
        Self {
            key: key.into(),
            secondary_keys: Vec::new(),
            value_start,
            value_end,
        }
    }

    /// Sets the secondary key at `pos`, padding earlier slots with `None`.
    #[must_use]
    pub fn with_secondary(mut self, pos: usize, key: impl Into<Vec<u8>>) -> Self {
        if self.secondary_keys.len() <= pos {
            self.secondary_keys.resize(pos + 1, None);
        }
        self.secondary_keys[pos] = Some(key.into());
        self
    }

    /// Returns the secondary key at `pos`, if the entry has one.
    #[must_use]
    pub fn secondary(&self, pos: usize) -> Option<&[u8]> {
        self.secondary_keys.get(pos).and_then(|k| k.as_deref())
    }
}

/// The unit stored in a balanced index tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNode {
    /// Lookup key (primary or secondary).
    pub key: Vec<u8>,
    /// Value start offset.
    pub start: u64,
    /// Value end offset.
    pub end: u64,
}

impl IndexNode {
    /// Creates a node.
    pub fn new(key: impl Into<Vec<u8>>, start: u64, end: u64) -> Self {
        Self {
            key: key.into(),
            start,
            end,
        }
    }

    /// Size of this node once serialized.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        NODE_FIXED_SIZE + self.key.len()
    }
}

/// Bytes of a serialized node excluding the key: key length (4), start (8),
/// end (8), left child (8), right child (8).
pub const NODE_FIXED_SIZE: usize = 4 + 8 + 8 + 8 + 8;
