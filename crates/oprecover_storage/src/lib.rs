//! # oprecover storage
//!
//! The lowest layer of oprecover: where bytes come from.
//!
//! Two abstractions live here, and neither interprets the data it carries:
//!
//! - [`ByteSource`] - a sequential, blocking stream (exact read, skip,
//!   available, close). Oplog segments are decoded from byte sources.
//! - [`StorageBackend`] - a random-access byte store. Deferred ("on disk")
//!   entry values are faulted in from a backend by offset and length.
//!
//! ## Available Sources
//!
//! - [`SliceSource`] - owned in-memory bytes
//! - [`FileSource`] - buffered sequential reads from a file
//! - [`BackendSource`] - sequential view over any [`StorageBackend`]
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - for testing and ephemeral stores
//! - [`FileBackend`] - persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use oprecover_storage::{ByteSource, SliceSource};
//!
//! let mut source = SliceSource::new(b"hello world".to_vec());
//! let mut buf = [0u8; 5];
//! source.read_exact(&mut buf).unwrap();
//! assert_eq!(&buf, b"hello");
//! assert_eq!(source.available().unwrap(), 6);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod source;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use source::{BackendSource, ByteSource, FileSource, SliceSource};
