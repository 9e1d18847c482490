//! # shardkv Testkit
//!
//! Test utilities for shardkv.
//!
//! This crate provides:
//! - Scratch directories and artifact helpers for segment index tests
//! - Property-based generators for key entries using proptest
//! - Recording fakes for the subsystems a shard tears down
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shardkv_testkit::prelude::*;
//!
//! let log = CallLog::new();
//! let store = Arc::new(FakeSubsystem::new("store", &log));
//! let shard = Shard::builder("s1").store(store).build();
//! shard.shutdown(&CancelToken::new()).await?;
//! assert_eq!(log.calls(), vec!["store.shutdown"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fakes;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fakes::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fakes::*;
pub use fixtures::*;
pub use generators::*;
