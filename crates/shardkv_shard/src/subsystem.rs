//! Interfaces of the subsystems a shard owns.
//!
//! A shard only coordinates these subsystems; it never looks inside them.
//! Every close-like method may be called more than once (shutdown can be
//! retried after a partial failure), so implementations must treat a
//! repeated call on an already closed subsystem as a no-op.

use crate::error::SubsystemResult;

/// Background re-indexing of the shard's data.
pub trait Reindexer: Send + Sync {
    /// Asks the re-indexer to stop. Must not block.
    fn stop(&self, reason: &str);
}

/// Tracks per-property value lengths for scoring.
pub trait PropertyLengthTracker: Send + Sync {
    /// Persists and closes the tracker.
    fn close(&self) -> SubsystemResult;
}

/// Registration handle of periodic cycle callbacks (compaction, flush, ...).
pub trait CycleCallbackCtrl: Send + Sync {
    /// Unregisters the callbacks, waiting for a running invocation to
    /// finish. May block.
    fn unregister(&self) -> SubsystemResult;
}

/// Asynchronous replication between shard replicas.
pub trait AsyncReplication: Send + Sync {
    /// Returns true while replication is running.
    fn is_running(&self) -> bool;

    /// Stops replication.
    fn stop(&self);
}

/// Write queue in front of a vector index.
pub trait VectorIndexQueue: Send + Sync {
    /// Persists queued writes.
    fn flush(&self) -> SubsystemResult;

    /// Closes the queue.
    fn close(&self) -> SubsystemResult;
}

/// A vector index.
pub trait VectorIndex: Send + Sync {
    /// Flushes the commit log to disk.
    fn flush(&self) -> SubsystemResult;

    /// Shuts the index down.
    fn shutdown(&self) -> SubsystemResult;
}

/// The LSM key/value store holding the shard's buckets.
pub trait LsmStore: Send + Sync {
    /// Flushes memtables and closes every bucket.
    fn shutdown(&self) -> SubsystemResult;
}

/// Database backing dynamic vector indexes.
pub trait DynamicVectorIndexDb: Send + Sync {
    /// Closes the database.
    fn close(&self) -> SubsystemResult;
}
