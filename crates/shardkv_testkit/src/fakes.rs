//! Recording fakes for the subsystems owned by a shard.
//!
//! Every fake writes `"{label}.{method}"` into a shared [`CallLog`] so tests
//! can assert on which subsystems were touched and in what order.

use parking_lot::Mutex;
use shardkv_shard::{
    AsyncReplication, CycleCallbackCtrl, DynamicVectorIndexDb, LsmStore, PropertyLengthTracker,
    Reindexer, SubsystemResult, VectorIndex, VectorIndexQueue,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Error returned by a fake that was told to fail.
#[derive(Debug, Error)]
#[error("{label}: injected {method} failure")]
pub struct FakeError {
    /// Label of the failing fake.
    pub label: String,
    /// The method that failed.
    pub method: &'static str,
}

/// Ordered record of subsystem calls, shared between fakes.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a call.
    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    /// Returns all calls so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Returns the number of times `call` was recorded.
    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    /// Returns the position of the first `call`.
    pub fn position(&self, call: &str) -> Option<usize> {
        self.calls.lock().iter().position(|c| c == call)
    }

    /// Returns true if any call starts with `label.`.
    pub fn touched(&self, label: &str) -> bool {
        let prefix = format!("{label}.");
        self.calls.lock().iter().any(|c| c.starts_with(&prefix))
    }
}

/// A fake implementing every subsystem trait.
///
/// Methods listed with [`Self::failing`] return a [`FakeError`]. Close-like
/// methods can be called any number of times.
#[derive(Debug)]
pub struct FakeSubsystem {
    label: String,
    log: CallLog,
    failing: Mutex<HashSet<&'static str>>,
    unregister_delay: Duration,
    running: AtomicBool,
}

impl FakeSubsystem {
    /// Creates a fake recording into `log`.
    pub fn new(label: impl Into<String>, log: &CallLog) -> Self {
        Self {
            label: label.into(),
            log: log.clone(),
            failing: Mutex::new(HashSet::new()),
            unregister_delay: Duration::ZERO,
            running: AtomicBool::new(false),
        }
    }

    /// Makes `method` fail.
    #[must_use]
    pub fn failing(self, method: &'static str) -> Self {
        self.failing.lock().insert(method);
        self
    }

    /// Makes `unregister` block for `delay`.
    #[must_use]
    pub fn with_unregister_delay(mut self, delay: Duration) -> Self {
        self.unregister_delay = delay;
        self
    }

    /// Sets whether replication reports itself as running.
    #[must_use]
    pub fn running(self, running: bool) -> Self {
        self.running.store(running, Ordering::SeqCst);
        self
    }

    /// Lets `method` succeed from now on.
    pub fn heal(&self, method: &'static str) {
        self.failing.lock().remove(method);
    }

    /// Wraps the fake in an `Arc`.
    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn call(&self, method: &'static str) -> SubsystemResult {
        self.log.record(format!("{}.{method}", self.label));
        if self.failing.lock().contains(method) {
            return Err(FakeError {
                label: self.label.clone(),
                method,
            }
            .into());
        }
        Ok(())
    }
}

impl Reindexer for FakeSubsystem {
    fn stop(&self, _reason: &str) {
        self.log.record(format!("{}.stop", self.label));
    }
}

impl PropertyLengthTracker for FakeSubsystem {
    fn close(&self) -> SubsystemResult {
        self.call("close")
    }
}

impl CycleCallbackCtrl for FakeSubsystem {
    fn unregister(&self) -> SubsystemResult {
        std::thread::sleep(self.unregister_delay);
        self.call("unregister")
    }
}

impl AsyncReplication for FakeSubsystem {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.log.record(format!("{}.stop", self.label));
    }
}

impl VectorIndexQueue for FakeSubsystem {
    fn flush(&self) -> SubsystemResult {
        self.call("flush")
    }

    fn close(&self) -> SubsystemResult {
        self.call("close")
    }
}

impl VectorIndex for FakeSubsystem {
    fn flush(&self) -> SubsystemResult {
        self.call("flush")
    }

    fn shutdown(&self) -> SubsystemResult {
        self.call("shutdown")
    }
}

impl LsmStore for FakeSubsystem {
    fn shutdown(&self) -> SubsystemResult {
        self.call("shutdown")
    }
}

impl DynamicVectorIndexDb for FakeSubsystem {
    fn close(&self) -> SubsystemResult {
        self.call("close")
    }
}
