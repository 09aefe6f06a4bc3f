//! # oprecover testkit
//!
//! Test utilities for oprecover.
//!
//! This crate provides:
//! - Disk store fixtures and canned scenarios
//! - Property-based generators for well-formed oplog histories
//! - A reference last-writer-wins model to check replays against
//! - Recording and failing export writers
//!
//! ## Usage
//!
//! ```rust
//! use oprecover_core::{NoopHooks, Recovery, RecoveryConfig};
//! use oprecover_testkit::prelude::*;
//!
//! let oplogs = scenario_oplogs();
//! let source = memory_source("doc", oprecover_codec::VersionTag::CURRENT, &oplogs);
//! let region = Recovery::new(RecoveryConfig::default())
//!     .run(&source, &mut NoopHooks)
//!     .unwrap();
//! assert!(ReferenceModel::replay(&oplogs).matches(&region.table));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod model;
pub mod writers;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::model::*;
    pub use crate::writers::*;
}

pub use fixtures::*;
pub use generators::*;
pub use model::*;
pub use writers::*;
