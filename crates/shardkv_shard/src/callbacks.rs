//! Cycle callback registrations owned by a shard.

use crate::error::SubsystemFailure;
use crate::subsystem::CycleCallbackCtrl;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::debug;

/// The periodic callbacks a shard registers with the cycle managers.
///
/// Any of them may be missing when the shard failed to initialize.
#[derive(Clone, Default)]
pub struct CycleCallbacks {
    /// Bucket compaction.
    pub compaction: Option<Arc<dyn CycleCallbackCtrl>>,
    /// Auxiliary bucket compaction.
    pub compaction_aux: Option<Arc<dyn CycleCallbackCtrl>>,
    /// Memtable flush.
    pub flush: Option<Arc<dyn CycleCallbackCtrl>>,
    /// Vector index maintenance (tombstone cleanup, commit log condensing).
    pub vector_combined: Option<Arc<dyn CycleCallbackCtrl>>,
    /// Geo property index maintenance.
    pub geo_props_combined: Option<Arc<dyn CycleCallbackCtrl>>,
}

impl CycleCallbacks {
    fn registered(&self) -> Vec<(&'static str, Arc<dyn CycleCallbackCtrl>)> {
        [
            ("compaction", &self.compaction),
            ("auxiliary compaction", &self.compaction_aux),
            ("flush", &self.flush),
            ("vector combined", &self.vector_combined),
            ("geo props combined", &self.geo_props_combined),
        ]
        .into_iter()
        .filter_map(|(name, ctrl)| ctrl.as_ref().map(|c| (name, Arc::clone(c))))
        .collect()
    }

    /// Unregisters every callback at once and waits for all of them, up to
    /// `timeout` in total.
    ///
    /// Each unregistration runs on the blocking pool, so a slow one does not
    /// hold up the others. One that is still running at the deadline is
    /// abandoned and reported as a failure.
    pub async fn unregister_all(&self, timeout: Duration) -> Vec<SubsystemFailure> {
        let deadline = Instant::now() + timeout;
        let pending: Vec<_> = self
            .registered()
            .into_iter()
            .map(|(name, ctrl)| (name, tokio::task::spawn_blocking(move || ctrl.unregister())))
            .collect();

        let mut failures = Vec::new();
        for (name, handle) in pending {
            let subsystem = format!("unregister {name} callbacks");
            match time::timeout_at(deadline, handle).await {
                Ok(Ok(Ok(()))) => debug!(callbacks = name, "unregistered cycle callbacks"),
                Ok(Ok(Err(e))) => failures.push(SubsystemFailure::new(subsystem, e)),
                Ok(Err(join_err)) => failures.push(SubsystemFailure::new(subsystem, join_err)),
                Err(_) => failures.push(SubsystemFailure::new(
                    subsystem,
                    format!("timed out after {timeout:?}"),
                )),
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SubsystemResult;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Ctrl {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl Ctrl {
        fn new(delay: Duration, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                fail,
            })
        }
    }

    impl CycleCallbackCtrl for Ctrl {
        fn unregister(&self) -> SubsystemResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            if self.fail {
                Err("callback still running".into())
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn missing_callbacks_are_skipped() {
        let callbacks = CycleCallbacks::default();
        assert!(callbacks.unregister_all(Duration::from_secs(1)).await.is_empty());
    }

    #[tokio::test]
    async fn every_callback_is_unregistered() {
        let flush = Ctrl::new(Duration::ZERO, false);
        let compaction = Ctrl::new(Duration::ZERO, true);
        let callbacks = CycleCallbacks {
            flush: Some(flush.clone()),
            compaction: Some(compaction.clone()),
            ..Default::default()
        };

        let failures = callbacks.unregister_all(Duration::from_secs(1)).await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].subsystem, "unregister compaction callbacks");
        assert_eq!(flush.calls.load(Ordering::SeqCst), 1);
        assert_eq!(compaction.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_callback_is_abandoned() {
        let slow = Ctrl::new(Duration::from_millis(300), false);
        let callbacks = CycleCallbacks {
            vector_combined: Some(slow),
            ..Default::default()
        };

        let failures = callbacks.unregister_all(Duration::from_millis(20)).await;
        assert_eq!(failures.len(), 1);
        assert!(failures[0].source.to_string().contains("timed out"));
    }
}
