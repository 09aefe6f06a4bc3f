//! CLI command implementations.

pub mod dump_oplog;
pub mod export;
pub mod validate;
