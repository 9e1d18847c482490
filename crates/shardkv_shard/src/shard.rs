//! The shard and the subsystems it owns.

use crate::callbacks::CycleCallbacks;
use crate::cancel::CancelToken;
use crate::config::ShardConfig;
use crate::error::{ShardError, ShardResult};
use crate::guard::{UsageGuard, UsageToken};
use crate::stats::ShardStats;
use crate::status::ShardStatus;
use crate::subsystem::{
    AsyncReplication, DynamicVectorIndexDb, LsmStore, PropertyLengthTracker, Reindexer,
    VectorIndex, VectorIndexQueue,
};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Subsystems a shard owns. Whatever failed to initialize stays `None` (or
/// missing from the maps).
#[derive(Clone, Default)]
pub(crate) struct ShardParts {
    pub(crate) reindexer: Option<Arc<dyn Reindexer>>,
    pub(crate) prop_length_tracker: Option<Arc<dyn PropertyLengthTracker>>,
    pub(crate) cycle_callbacks: CycleCallbacks,
    pub(crate) async_replication: Option<Arc<dyn AsyncReplication>>,
    pub(crate) vector_queues: BTreeMap<String, Arc<dyn VectorIndexQueue>>,
    pub(crate) vector_indexes: BTreeMap<String, Arc<dyn VectorIndex>>,
    pub(crate) store: Option<Arc<dyn LsmStore>>,
    pub(crate) dynamic_vector_index_db: Option<Arc<dyn DynamicVectorIndexDb>>,
    pub(crate) dimension_tracking: Option<CancelToken>,
}

/// A unit of storage ownership: an LSM store plus the vector indexes,
/// queues and background cycles built on top of it.
///
/// Operations run against a shard hold a [`UsageToken`] from
/// [`Shard::enter`]; [`Shard::shutdown`] waits for all of them before
/// tearing anything down.
pub struct Shard {
    name: String,
    config: ShardConfig,
    guard: UsageGuard,
    status: RwLock<ShardStatus>,
    stats: ShardStats,
    pub(crate) parts: ShardParts,
    pub(crate) halt_for_transfer: Mutex<Option<CancelToken>>,
    tearing_down: AtomicBool,
}

/// Exclusive right to run the teardown; released on drop.
pub(crate) struct TeardownTurn<'a> {
    running: &'a AtomicBool,
}

impl Drop for TeardownTurn<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

impl fmt::Debug for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shard")
            .field("name", &self.name)
            .field("status", &self.status())
            .field("in_use", &self.guard.in_use())
            .field("vector_indexes", &self.parts.vector_indexes.keys().collect::<Vec<_>>())
            .field("has_store", &self.parts.store.is_some())
            .finish()
    }
}

impl Shard {
    /// Starts building a shard.
    pub fn builder(name: impl Into<String>) -> ShardBuilder {
        ShardBuilder::new(name)
    }

    /// Returns the shard name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the lifecycle configuration.
    #[must_use]
    pub fn config(&self) -> &ShardConfig {
        &self.config
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> ShardStatus {
        *self.status.read()
    }

    /// Changes the status.
    ///
    /// # Errors
    ///
    /// Returns [`ShardError::AlreadyShuttingDown`] once the shard is shut
    /// down; that status is final.
    pub fn update_status(&self, status: ShardStatus) -> ShardResult<()> {
        let mut current = self.status.write();
        if *current == ShardStatus::Shutdown {
            return Err(ShardError::AlreadyShuttingDown);
        }
        if *current != status {
            debug!(shard = %self.name, from = %*current, to = %status, "shard status changed");
            *current = status;
            self.stats.record_status_update();
        }
        Ok(())
    }

    /// Returns `None` while another teardown is running.
    pub(crate) fn try_begin_teardown(&self) -> Option<TeardownTurn<'_>> {
        self.tearing_down
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TeardownTurn {
                running: &self.tearing_down,
            })
    }

    pub(crate) fn mark_shut_down(&self) {
        let mut current = self.status.write();
        if *current != ShardStatus::Shutdown {
            *current = ShardStatus::Shutdown;
            self.stats.record_status_update();
        }
    }

    /// Returns the lifecycle counters.
    #[must_use]
    pub fn stats(&self) -> &ShardStats {
        &self.stats
    }

    /// Returns the usage guard.
    #[must_use]
    pub fn usage_guard(&self) -> &UsageGuard {
        &self.guard
    }

    /// Admits an operation against the shard.
    ///
    /// Keep the returned token alive for as long as the operation touches
    /// any subsystem of the shard.
    ///
    /// # Errors
    ///
    /// Returns [`ShardError::AlreadyShuttingDown`] once shutdown has begun.
    pub fn enter(&self) -> ShardResult<UsageToken> {
        match self.guard.try_enter() {
            Ok(token) => {
                self.stats.record_admitted();
                Ok(token)
            }
            Err(e) => {
                self.stats.record_rejected();
                Err(e)
            }
        }
    }

    /// Registers a pause for a transfer (backup, replica movement).
    ///
    /// The returned token is cancelled when the transfer is aborted by
    /// shutdown. Registering a new transfer replaces the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`ShardError::AlreadyShuttingDown`] once shutdown has begun.
    pub fn begin_halt_for_transfer(&self) -> ShardResult<CancelToken> {
        // shutdown marks the guard shut before it empties the slot, so
        // checking under the slot lock never strands a token
        let mut slot = self.halt_for_transfer.lock();
        if self.guard.is_shut() {
            return Err(ShardError::AlreadyShuttingDown);
        }
        let token = CancelToken::new();
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Clears the registered transfer pause.
    pub fn end_halt_for_transfer(&self) {
        self.halt_for_transfer.lock().take();
    }

    /// Names of the target vectors with a vector index, in order.
    pub fn target_vectors(&self) -> impl Iterator<Item = &str> + '_ {
        self.parts.vector_indexes.keys().map(String::as_str)
    }

    /// Returns true if the LSM store was initialized.
    #[must_use]
    pub fn has_store(&self) -> bool {
        self.parts.store.is_some()
    }
}

/// Assembles a [`Shard`] from the subsystems that initialized successfully.
///
/// # Example
///
/// ```rust,ignore
/// let shard = Shard::builder("products_a1b2")
///     .config(ShardConfig::default())
///     .store(store)
///     .vector_index("default", hnsw)
///     .build();
/// ```
#[must_use]
pub struct ShardBuilder {
    name: String,
    config: ShardConfig,
    status: ShardStatus,
    parts: ShardParts,
}

impl ShardBuilder {
    /// Creates a builder for a shard without any subsystems.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: ShardConfig::default(),
            status: ShardStatus::Ready,
            parts: ShardParts::default(),
        }
    }

    /// Sets the lifecycle configuration.
    pub fn config(mut self, config: ShardConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the initial status.
    pub fn status(mut self, status: ShardStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the re-indexer.
    pub fn reindexer(mut self, reindexer: Arc<dyn Reindexer>) -> Self {
        self.parts.reindexer = Some(reindexer);
        self
    }

    /// Sets the property length tracker.
    pub fn prop_length_tracker(mut self, tracker: Arc<dyn PropertyLengthTracker>) -> Self {
        self.parts.prop_length_tracker = Some(tracker);
        self
    }

    /// Sets the cycle callback registrations.
    pub fn cycle_callbacks(mut self, callbacks: CycleCallbacks) -> Self {
        self.parts.cycle_callbacks = callbacks;
        self
    }

    /// Sets async replication.
    pub fn async_replication(mut self, replication: Arc<dyn AsyncReplication>) -> Self {
        self.parts.async_replication = Some(replication);
        self
    }

    /// Adds the vector index queue of `target_vector`.
    pub fn vector_queue(
        mut self,
        target_vector: impl Into<String>,
        queue: Arc<dyn VectorIndexQueue>,
    ) -> Self {
        self.parts.vector_queues.insert(target_vector.into(), queue);
        self
    }

    /// Adds the vector index of `target_vector`.
    pub fn vector_index(mut self, target_vector: impl Into<String>, index: Arc<dyn VectorIndex>) -> Self {
        self.parts.vector_indexes.insert(target_vector.into(), index);
        self
    }

    /// Sets the LSM store.
    pub fn store(mut self, store: Arc<dyn LsmStore>) -> Self {
        self.parts.store = Some(store);
        self
    }

    /// Sets the dynamic vector index database.
    pub fn dynamic_vector_index_db(mut self, db: Arc<dyn DynamicVectorIndexDb>) -> Self {
        self.parts.dynamic_vector_index_db = Some(db);
        self
    }

    /// Sets the stop signal of the dimension tracking task.
    pub fn dimension_tracking(mut self, stop: CancelToken) -> Self {
        self.parts.dimension_tracking = Some(stop);
        self
    }

    /// Builds the shard.
    pub fn build(self) -> Shard {
        Shard {
            name: self.name,
            config: self.config,
            guard: UsageGuard::new(),
            status: RwLock::new(self.status),
            stats: ShardStats::new(),
            parts: self.parts,
            halt_for_transfer: Mutex::new(None),
            tearing_down: AtomicBool::new(false),
        }
    }
}
