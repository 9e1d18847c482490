//! # shardkv Shard Lifecycle
//!
//! Admission control and teardown of a shard.
//!
//! A shard owns an LSM store plus the vector indexes, queues and background
//! cycles built on top of it. This crate does not implement any of those
//! subsystems; it coordinates them through the traits in [`subsystem`]:
//!
//! - [`UsageGuard`] counts the operations in flight and refuses new ones
//!   once shutdown has begun.
//! - [`Shard::shutdown`] waits for the shard to quiesce and then closes
//!   every subsystem in order, collecting failures instead of stopping at
//!   the first one.
//!
//! ## Example
//!
//! ```rust,ignore
//! let shard = Shard::builder("products_a1b2")
//!     .store(store)
//!     .vector_index("default", index)
//!     .build();
//!
//! {
//!     let _op = shard.enter()?;
//!     // ... read or write ...
//! }
//!
//! shard.shutdown(&CancelToken::new()).await?;
//! assert_eq!(shard.status(), ShardStatus::Shutdown);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod callbacks;
mod cancel;
mod config;
mod error;
mod guard;
mod shard;
mod shutdown;
mod stats;
mod status;
pub mod subsystem;

pub use callbacks::CycleCallbacks;
pub use cancel::CancelToken;
pub use config::ShardConfig;
pub use error::{
    BoxError, ErrorCompounder, ShardError, ShardResult, SubsystemFailure, SubsystemResult,
    TeardownErrors,
};
pub use guard::{UsageGuard, UsageToken};
pub use shard::{Shard, ShardBuilder};
pub use stats::ShardStats;
pub use status::ShardStatus;
pub use subsystem::{
    AsyncReplication, CycleCallbackCtrl, DynamicVectorIndexDb, LsmStore, PropertyLengthTracker,
    Reindexer, VectorIndex, VectorIndexQueue,
};
