//! # oprecover core
//!
//! Oplog replay for disk stores.
//!
//! A disk store persists a region as a series of append-only oplogs. This
//! crate rebuilds the region's last known state by replaying those oplogs in
//! id order, and lets other consumers ride on the same replay:
//!
//! - [`oplog`] - segment format, streaming decoder and writer
//! - [`Recovery`] - the replay state machine and its [`RecoveryTable`]
//! - [`RecoveryHooks`] - event surface for replay consumers
//! - [`ValidatingOverlay`] - structural checks without materializing values
//! - [`ExportOverlay`] - validation plus per-oplog batch export
//! - [`DiskStoreDir`] / [`MemoryOplogSource`] - where oplogs come from
//!
//! Every failure during a pass aborts it and surfaces as
//! [`CoreError::DiskAccess`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod entry;
mod error;
mod export;
mod hooks;
mod key;
pub mod oplog;
mod recovery;
mod source;
mod table;
mod types;
mod validate;

pub use config::{RecoveryConfig, DEFAULT_MAX_RECORD_SIZE};
pub use dir::DiskStoreDir;
pub use entry::{EntryValue, RecoveredEntry};
pub use error::{CoreError, CoreResult};
pub use export::{ExportBatch, ExportOverlay, ExportStats, ExportWriter};
pub use hooks::{NoopHooks, RecoveryHooks};
pub use key::EntryKey;
pub use oplog::{OplogRecord, OplogRecordType};
pub use recovery::{RecoveredRegion, Recovery, RecoveryState, RecoveryStats};
pub use source::{MemoryOplogSource, OplogSource};
pub use table::RecoveryTable;
pub use types::{OplogId, Stamp};
pub use validate::{ValidatingOverlay, ValidationReport};

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
