//! Shard lifecycle counters.
//!
//! All counters are atomic and purely observational: nothing in the
//! lifecycle logic reads them back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lifecycle statistics of one shard.
#[derive(Debug, Default)]
pub struct ShardStats {
    /// Operations admitted by the usage guard.
    operations_admitted: AtomicU64,
    /// Operations rejected because the shard was shutting down.
    operations_rejected: AtomicU64,
    /// Status changes.
    status_updates: AtomicU64,
    /// Shutdowns that completed without failures.
    shutdowns_completed: AtomicU64,
    /// Shutdowns that returned an error.
    shutdowns_failed: AtomicU64,
    /// Duration of the last completed shutdown in microseconds.
    last_shutdown_micros: AtomicU64,
}

impl ShardStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_admitted(&self) {
        self.operations_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.operations_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_status_update(&self) {
        self.status_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_shutdown(&self, elapsed: Duration) {
        self.shutdowns_completed.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.last_shutdown_micros.store(micros, Ordering::Relaxed);
    }

    pub(crate) fn record_failed_shutdown(&self) {
        self.shutdowns_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of admitted operations.
    pub fn operations_admitted(&self) -> u64 {
        self.operations_admitted.load(Ordering::Relaxed)
    }

    /// Returns the number of rejected operations.
    pub fn operations_rejected(&self) -> u64 {
        self.operations_rejected.load(Ordering::Relaxed)
    }

    /// Returns the number of status changes.
    pub fn status_updates(&self) -> u64 {
        self.status_updates.load(Ordering::Relaxed)
    }

    /// Returns the number of successful shutdowns.
    pub fn shutdowns_completed(&self) -> u64 {
        self.shutdowns_completed.load(Ordering::Relaxed)
    }

    /// Returns the number of failed shutdowns.
    pub fn shutdowns_failed(&self) -> u64 {
        self.shutdowns_failed.load(Ordering::Relaxed)
    }

    /// Returns the duration of the last successful shutdown.
    pub fn last_shutdown_duration(&self) -> Option<Duration> {
        if self.shutdowns_completed() == 0 {
            return None;
        }
        Some(Duration::from_micros(
            self.last_shutdown_micros.load(Ordering::Relaxed),
        ))
    }
}
