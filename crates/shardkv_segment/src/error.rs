//! Error types for segment index operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for segment index operations.
pub type SegmentResult<T> = Result<T, SegmentError>;

/// Errors that can occur while building or reading segment indexes.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// The destination stream or a staged file could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A scratch space operation failed.
    #[error("scratch space {action} failed at {}: {source}", path.display())]
    Scratch {
        /// Path of the scratch space or staged file.
        path: PathBuf,
        /// What was being attempted.
        action: &'static str,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A key does not fit the 32-bit length prefix of the node format.
    #[error("key of {len} bytes exceeds the maximum index key length")]
    KeyTooLarge {
        /// Length of the offending key.
        len: usize,
    },

    /// Serialized index bytes are malformed.
    #[error("corrupted segment index: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },
}

impl SegmentError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    pub(crate) fn scratch(path: impl Into<PathBuf>, action: &'static str, source: io::Error) -> Self {
        Self::Scratch {
            path: path.into(),
            action,
            source,
        }
    }
}
