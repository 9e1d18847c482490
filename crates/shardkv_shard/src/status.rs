//! Externally observable shard status.

use std::fmt;

/// Status of a shard as reported to the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShardStatus {
    /// Subsystems are still being initialized.
    #[default]
    Loading,
    /// Serving reads and writes.
    Ready,
    /// Serving reads only.
    ReadOnly,
    /// Rebuilding indexes.
    Indexing,
    /// Shut down; no further operations are possible.
    Shutdown,
}

impl ShardStatus {
    /// Returns the status name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ShardStatus::Loading => "LOADING",
            ShardStatus::Ready => "READY",
            ShardStatus::ReadOnly => "READONLY",
            ShardStatus::Indexing => "INDEXING",
            ShardStatus::Shutdown => "SHUTDOWN",
        }
    }
}

impl fmt::Display for ShardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names() {
        assert_eq!(ShardStatus::default().to_string(), "LOADING");
        assert_eq!(ShardStatus::Shutdown.to_string(), "SHUTDOWN");
    }
}
