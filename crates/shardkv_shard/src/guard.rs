//! Admission control for operations running against a shard.
//!
//! ```text
//! operation                       shutdown
//!   shut == false                   loop every interval:
//!     in_use += 1                     shut == true  -> fail
//!     ... work ...                    in_use == 0   -> shut = true, proceed
//!     in_use -= 1
//!   shut == true
//!     reject
//! ```
//!
//! Admission takes the lock shared and the shutdown check takes it
//! exclusively, so no operation can slip in between the check reading
//! `in_use == 0` and `shut` being set.

use crate::cancel::CancelToken;
use crate::error::{ShardError, ShardResult};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

/// Shortest polling interval; `tokio::time::interval` rejects zero.
const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Default)]
struct GuardState {
    shut: RwLock<bool>,
    in_use: AtomicI64,
}

/// Reference count of in-flight operations plus the one-way shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct UsageGuard {
    state: Arc<GuardState>,
}

/// Proof of an admitted operation. Dropping it releases the operation.
#[derive(Debug)]
#[must_use = "the operation is released as soon as the token is dropped"]
pub struct UsageToken {
    state: Arc<GuardState>,
}

impl Drop for UsageToken {
    fn drop(&mut self) {
        self.state.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

impl UsageGuard {
    /// Creates an open guard with no operations in flight.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits an operation.
    ///
    /// # Errors
    ///
    /// Returns [`ShardError::AlreadyShuttingDown`] once shutdown has been
    /// marked eligible.
    pub fn try_enter(&self) -> ShardResult<UsageToken> {
        let shut = self.state.shut.read();
        if *shut {
            return Err(ShardError::AlreadyShuttingDown);
        }

        self.state.in_use.fetch_add(1, Ordering::AcqRel);
        Ok(UsageToken {
            state: Arc::clone(&self.state),
        })
    }

    /// Marks the shard as shutting down if nothing is in flight.
    ///
    /// Returns `Ok(true)` if the flag was set by this call and `Ok(false)` if
    /// operations are still running (nothing changes in that case).
    ///
    /// # Errors
    ///
    /// Returns [`ShardError::AlreadyShuttingDown`] if the flag was already
    /// set.
    pub fn check_eligible_for_shutdown(&self) -> ShardResult<bool> {
        let mut shut = self.state.shut.write();
        if *shut {
            return Err(ShardError::AlreadyShuttingDown);
        }

        if self.state.in_use.load(Ordering::Acquire) == 0 {
            *shut = true;
            return Ok(true);
        }

        Ok(false)
    }

    /// Polls [`Self::check_eligible_for_shutdown`] every `interval` until it
    /// succeeds. Intervals shorter than 1ms are raised to 1ms.
    ///
    /// # Errors
    ///
    /// - [`ShardError::ShutdownTimeout`] if operations are still in flight
    ///   after `timeout`
    /// - [`ShardError::Cancelled`] if `cancel` fires first
    /// - [`ShardError::AlreadyShuttingDown`] if the flag was already set
    pub async fn wait_until_shuttable(
        &self,
        interval: Duration,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> ShardResult<()> {
        if self.check_eligible_for_shutdown()? {
            return Ok(());
        }

        debug!(in_use = self.in_use(), "waiting for in-flight operations before shutdown");

        let deadline = time::sleep(timeout);
        tokio::pin!(deadline);

        let mut ticker = time::interval(interval.max(MIN_CHECK_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately and we just checked
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => return Err(ShardError::Cancelled),
                () = &mut deadline => {
                    return Err(ShardError::ShutdownTimeout {
                        timeout,
                        in_use: self.in_use(),
                    });
                }
                _ = ticker.tick() => {
                    if self.check_eligible_for_shutdown()? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Number of operations currently in flight.
    #[must_use]
    pub fn in_use(&self) -> i64 {
        self.state.in_use.load(Ordering::Acquire)
    }

    /// Returns true once shutdown has been marked eligible.
    #[must_use]
    pub fn is_shut(&self) -> bool {
        *self.state.shut.read()
    }
}
