//! Shard teardown.

use crate::cancel::CancelToken;
use crate::error::{ErrorCompounder, ShardError, ShardResult};
use crate::shard::Shard;
use crate::status::ShardStatus;
use std::time::Instant;
use tracing::{debug, info, warn};

impl Shard {
    /// Shuts down every subsystem of the shard.
    ///
    /// Waits until no operation is in flight, then closes the subsystems in
    /// dependency order: callbacks first so nothing schedules new work, the
    /// vector indexes and their queues next, the LSM store after them. A
    /// subsystem that fails does not stop the ones after it; all failures are
    /// returned together.
    ///
    /// `cancel` only aborts the wait for in-flight operations. Once the
    /// subsystems are being closed the teardown runs to completion.
    ///
    /// Calling this again after a failure retries the teardown. Calling it
    /// after it succeeded does nothing. Calling it while another teardown is
    /// running fails with [`ShardError::AlreadyShuttingDown`].
    ///
    /// # Errors
    ///
    /// - [`ShardError::ShutdownTimeout`] or [`ShardError::Cancelled`] if the
    ///   shard did not quiesce; nothing has been closed in that case
    /// - [`ShardError::AlreadyShuttingDown`] if another teardown is running
    /// - [`ShardError::Teardown`] listing every subsystem that failed; the
    ///   status stays unchanged
    pub async fn shutdown(&self, cancel: &CancelToken) -> ShardResult<()> {
        if self.status() == ShardStatus::Shutdown {
            debug!(shard = %self.name(), "shard already shut down");
            return Ok(());
        }

        let Some(_turn) = self.try_begin_teardown() else {
            debug!(shard = %self.name(), "shard teardown already in progress");
            return Err(ShardError::AlreadyShuttingDown);
        };
        // the previous turn may have finished the job
        if self.status() == ShardStatus::Shutdown {
            return Ok(());
        }

        let start = Instant::now();

        if let Some(reindexer) = &self.parts.reindexer {
            reindexer.stop("shard shutdown");
        }

        let config = self.config();
        match self
            .usage_guard()
            .wait_until_shuttable(config.shutdown_check_interval, config.shutdown_timeout, cancel)
            .await
        {
            Ok(()) => {}
            // an earlier, finished attempt already quiesced the shard
            Err(ShardError::AlreadyShuttingDown) => {
                debug!(shard = %self.name(), "retrying shard teardown");
            }
            Err(e) => {
                self.stats().record_failed_shutdown();
                warn!(shard = %self.name(), error = %e, "shard did not quiesce");
                return Err(e);
            }
        }

        if let Some(transfer) = self.halt_for_transfer.lock().take() {
            transfer.cancel();
        }

        let mut ec = ErrorCompounder::new();

        if let Some(tracker) = &self.parts.prop_length_tracker {
            ec.add("close prop length tracker", tracker.close());
        }

        for failure in self
            .parts
            .cycle_callbacks
            .unregister_all(config.callback_unregister_timeout)
            .await
        {
            ec.push(failure);
        }

        if let Some(replication) = &self.parts.async_replication {
            if replication.is_running() {
                replication.stop();
            }
        }

        for (target, queue) in &self.parts.vector_queues {
            ec.add(
                format!("flush vector index queue of vector {target:?}"),
                queue.flush(),
            );
            ec.add(
                format!("shut down vector index queue of vector {target:?}"),
                queue.close(),
            );
        }

        // the commit log must be flushed, otherwise tombstone cleanup entries
        // are lost and replayed forever on restart
        for (target, index) in &self.parts.vector_indexes {
            ec.add(
                format!("flush vector index commitlog of vector {target:?}"),
                index.flush(),
            );
            ec.add(
                format!("shut down vector index of vector {target:?}"),
                index.shutdown(),
            );
        }

        if let Some(store) = &self.parts.store {
            ec.add("stop lsmkv store", store.shutdown());
        }

        if let Some(db) = &self.parts.dynamic_vector_index_db {
            ec.add("stop dynamic vector index db", db.close());
        }

        if let Some(stop) = &self.parts.dimension_tracking {
            stop.cancel();
        }

        let failures = ec.len();
        match ec.into_result() {
            Ok(()) => {
                self.mark_shut_down();
                let elapsed = start.elapsed();
                self.stats().record_shutdown(elapsed);
                info!(shard = %self.name(), elapsed_ms = elapsed.as_millis() as u64, "shard shut down");
                Ok(())
            }
            Err(e) => {
                self.stats().record_failed_shutdown();
                warn!(shard = %self.name(), failures, "shard shutdown incomplete");
                Err(e)
            }
        }
    }
}
