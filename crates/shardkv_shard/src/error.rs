//! Error types for shard lifecycle operations.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for shard operations.
pub type ShardResult<T> = Result<T, ShardError>;

/// Error type returned by subsystems owned by a shard.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type returned by subsystems owned by a shard.
pub type SubsystemResult = Result<(), BoxError>;

/// Errors that can occur in shard lifecycle operations.
#[derive(Debug, Error)]
pub enum ShardError {
    /// The shard no longer admits operations.
    #[error("shard is already shutting down")]
    AlreadyShuttingDown,

    /// Operations were still in flight when the quiescence wait ran out.
    #[error("shard still had {in_use} operation(s) in use after waiting {timeout:?} for shutdown")]
    ShutdownTimeout {
        /// How long the wait lasted.
        timeout: Duration,
        /// Operations in flight when the wait gave up.
        in_use: i64,
    },

    /// The quiescence wait was cancelled by the caller.
    #[error("shard shutdown cancelled while waiting for in-flight operations")]
    Cancelled,

    /// One or more subsystems failed to shut down.
    #[error(transparent)]
    Teardown(#[from] TeardownErrors),
}

impl ShardError {
    /// Returns the subsystem failures of a teardown error.
    #[must_use]
    pub fn teardown_failures(&self) -> &[SubsystemFailure] {
        match self {
            ShardError::Teardown(errors) => errors.failures(),
            _ => &[],
        }
    }
}

/// One subsystem that failed during teardown.
#[derive(Debug, Error)]
#[error("{subsystem}: {source}")]
pub struct SubsystemFailure {
    /// What was being shut down.
    pub subsystem: String,
    /// The subsystem's error.
    #[source]
    pub source: BoxError,
}

impl SubsystemFailure {
    /// Creates a failure tagged with `subsystem`.
    pub fn new(subsystem: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            subsystem: subsystem.into(),
            source: source.into(),
        }
    }
}

/// All subsystem failures collected during one teardown, in order.
#[derive(Debug)]
pub struct TeardownErrors {
    failures: Vec<SubsystemFailure>,
}

impl TeardownErrors {
    /// The collected failures.
    #[must_use]
    pub fn failures(&self) -> &[SubsystemFailure] {
        &self.failures
    }

    /// Returns true if any failure is tagged with `subsystem`.
    #[must_use]
    pub fn contains(&self, subsystem: &str) -> bool {
        self.failures.iter().any(|f| f.subsystem == subsystem)
    }
}

impl fmt::Display for TeardownErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shard shutdown failed for {} subsystem(s): ", self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for TeardownErrors {}

/// Accumulates subsystem failures so that teardown keeps going after one
/// subsystem fails.
#[derive(Debug, Default)]
pub struct ErrorCompounder {
    failures: Vec<SubsystemFailure>,
}

impl ErrorCompounder {
    /// Creates an empty compounder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the error of `result`, if any, tagged with `subsystem`.
    pub fn add(&mut self, subsystem: impl Into<String>, result: SubsystemResult) {
        if let Err(source) = result {
            self.push(SubsystemFailure {
                subsystem: subsystem.into(),
                source,
            });
        }
    }

    /// Records a failure.
    pub fn push(&mut self, failure: SubsystemFailure) {
        tracing::warn!(subsystem = %failure.subsystem, error = %failure.source, "subsystem shutdown failed");
        self.failures.push(failure);
    }

    /// Number of failures recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Returns true if nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Converts the collected failures into a single result.
    pub fn into_result(self) -> ShardResult<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(ShardError::Teardown(TeardownErrors {
                failures: self.failures,
            }))
        }
    }
}
