//! Disk store directory management.
//!
//! This module handles the file system layout of a disk store:
//!
//! ```text
//! <store>/
//! ├─ LOCK                         # Advisory lock
//! ├─ oplogs/
//! │  └─ 000000000000002a.oplog    # One segment per oplog id, hex
//! └─ values.dat                   # Values referenced by on-disk entries
//! ```
//!
//! Readers take a shared lock and writers an exclusive one, so offline tools
//! never inspect a store another process is writing.

use crate::entry::{EntryValue, RecoveredEntry};
use crate::error::{CoreError, CoreResult};
use crate::oplog::{open_segment, OplogWriter};
use crate::source::OplogSource;
use crate::types::OplogId;
use bytes::Bytes;
use fs2::FileExt;
use oprecover_codec::{VersionTag, VersionedReader};
use oprecover_storage::{FileBackend, FileSource, InMemoryBackend, StorageBackend};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const LOCK_FILE: &str = "LOCK";
const OPLOGS_DIR: &str = "oplogs";
const VALUES_FILE: &str = "values.dat";
const OPLOG_EXTENSION: &str = "oplog";

/// A disk store's directory, locked for the lifetime of this value.
pub struct DiskStoreDir {
    path: PathBuf,
    name: String,
    values: Box<dyn StorageBackend>,
    writable: bool,
    _lock_file: File,
}

impl DiskStoreDir {
    /// Opens an existing store for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory or its `oplogs/` subdirectory is missing
    /// - Another process holds the lock exclusively (`StoreLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path) -> CoreResult<Self> {
        if !path.join(OPLOGS_DIR).is_dir() {
            return Err(CoreError::invalid_format(format!(
                "not a disk store (no {OPLOGS_DIR}/ directory): {}",
                path.display()
            )));
        }

        let lock_file = Self::open_lock(path)?;
        if lock_file.try_lock_shared().is_err() {
            return Err(CoreError::StoreLocked {
                path: path.display().to_string(),
            });
        }

        let values_path = path.join(VALUES_FILE);
        let values: Box<dyn StorageBackend> = if values_path.exists() {
            Box::new(FileBackend::open_read_only(&values_path)?)
        } else {
            Box::new(InMemoryBackend::new())
        };

        Ok(Self {
            path: path.to_path_buf(),
            name: store_name(path),
            values,
            writable: false,
            _lock_file: lock_file,
        })
    }

    /// Creates a store, or opens an existing one, for writing.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is held by anyone else or the layout
    /// cannot be created.
    pub fn create(path: &Path) -> CoreResult<Self> {
        fs::create_dir_all(path.join(OPLOGS_DIR))?;

        let lock_file = Self::open_lock(path)?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::StoreLocked {
                path: path.display().to_string(),
            });
        }

        let values = FileBackend::open(&path.join(VALUES_FILE))?;

        Ok(Self {
            path: path.to_path_buf(),
            name: store_name(path),
            values: Box::new(values),
            writable: true,
            _lock_file: lock_file,
        })
    }

    fn open_lock(path: &Path) -> CoreResult<File> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?)
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of oplog `id`'s segment.
    #[must_use]
    pub fn oplog_path(&self, id: OplogId) -> PathBuf {
        self.path
            .join(OPLOGS_DIR)
            .join(format!("{:016x}.{OPLOG_EXTENSION}", id.as_u64()))
    }

    /// Lists the oplogs present, in directory order.
    ///
    /// Files without the `.oplog` extension are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] for an `.oplog` file whose name
    /// is not a 16-digit hex id.
    pub fn list_oplogs(&self) -> CoreResult<Vec<OplogId>> {
        let mut ids = Vec::new();
        for dir_entry in fs::read_dir(self.path.join(OPLOGS_DIR))? {
            let file_path = dir_entry?.path();
            if file_path.extension().and_then(|e| e.to_str()) != Some(OPLOG_EXTENSION) {
                debug!(path = %file_path.display(), "ignoring non-oplog file");
                continue;
            }
            let id = file_path
                .file_stem()
                .and_then(|s| s.to_str())
                .filter(|s| s.len() == 16)
                .and_then(|s| u64::from_str_radix(s, 16).ok())
                .ok_or_else(|| {
                    CoreError::invalid_format(format!(
                        "malformed oplog file name: {}",
                        file_path.display()
                    ))
                })?;
            ids.push(OplogId::new(id));
        }
        Ok(ids)
    }

    /// Starts a new oplog segment.
    ///
    /// # Errors
    ///
    /// Fails if the store was opened read-only or the oplog already exists.
    pub fn create_oplog(&self, id: OplogId, version: VersionTag) -> CoreResult<OplogWriter<FileBackend>> {
        self.ensure_writable()?;
        let path = self.oplog_path(id);
        if path.exists() {
            return Err(CoreError::invalid_format(format!("{id} already exists")));
        }
        OplogWriter::create(FileBackend::open(&path)?, id, version)
    }

    /// Appends a value to `values.dat`, returning a reference to it.
    ///
    /// # Errors
    ///
    /// Fails if the store was opened read-only or the write fails.
    pub fn append_value(&mut self, value: &[u8]) -> CoreResult<EntryValue> {
        self.ensure_writable()?;
        let length = u32::try_from(value.len())
            .map_err(|_| CoreError::invalid_format("value larger than 4 GiB"))?;
        let offset = self.values.append(value)?;
        self.values.flush()?;
        Ok(EntryValue::OnDisk { offset, length })
    }

    /// Returns the value store deferred entries are read from.
    #[must_use]
    pub fn value_store(&self) -> &dyn StorageBackend {
        self.values.as_ref()
    }

    /// Returns `entry`'s value bytes, faulting in deferred values.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DiskAccess`] naming this store if the value
    /// cannot be read.
    pub fn materialize(&self, entry: &RecoveredEntry) -> CoreResult<Bytes> {
        entry.materialize(self.value_store()).map_err(|e| {
            warn!(store = %self.name, error = %e, "failed to fault in value");
            CoreError::disk_access(self.name.as_str(), e)
        })
    }

    fn ensure_writable(&self) -> CoreResult<()> {
        if self.writable {
            Ok(())
        } else {
            Err(CoreError::state(format!(
                "disk store {} is open read-only",
                self.name
            )))
        }
    }
}

fn store_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl OplogSource for DiskStoreDir {
    type Source = FileSource;

    fn name(&self) -> &str {
        &self.name
    }

    fn oplog_ids(&self) -> CoreResult<Vec<OplogId>> {
        self.list_oplogs()
    }

    fn open_oplog(&self, id: OplogId) -> CoreResult<VersionedReader<FileSource>> {
        let source = FileSource::open(&self.oplog_path(id))?;
        open_segment(source, Some(id))
    }
}

impl std::fmt::Debug for DiskStoreDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskStoreDir")
            .field("path", &self.path)
            .field("writable", &self.writable)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oplog::OplogRecord;
    use crate::types::Stamp;
    use tempfile::tempdir;

    #[test]
    fn open_requires_layout() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            DiskStoreDir::open(dir.path()),
            Err(CoreError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn create_then_list() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("store-a");
        {
            let store = DiskStoreDir::create(&store_path).unwrap();
            let mut writer = store.create_oplog(OplogId::new(42), VersionTag::V2).unwrap();
            writer
                .append(&OplogRecord::create("k", &b"v"[..], Stamp::new(1, 1)))
                .unwrap();
            writer.flush().unwrap();
            fs::write(store_path.join(OPLOGS_DIR).join("README"), b"x").unwrap();
        }

        let store = DiskStoreDir::open(&store_path).unwrap();
        assert_eq!(store.name(), "store-a");
        assert_eq!(store.list_oplogs().unwrap(), vec![OplogId::new(42)]);
        assert!(store.oplog_path(OplogId::new(42)).ends_with("000000000000002a.oplog"));

        let reader = store.open_oplog(OplogId::new(42)).unwrap();
        assert_eq!(reader.version(), VersionTag::V2);
    }

    #[test]
    fn malformed_oplog_name_rejected() {
        let dir = tempdir().unwrap();
        drop(DiskStoreDir::create(dir.path()).unwrap());
        fs::write(dir.path().join(OPLOGS_DIR).join("zz.oplog"), b"").unwrap();

        let store = DiskStoreDir::open(dir.path()).unwrap();
        assert!(store.list_oplogs().is_err());
    }

    #[test]
    fn writer_excludes_readers() {
        let dir = tempdir().unwrap();
        let _writer = DiskStoreDir::create(dir.path()).unwrap();
        assert!(matches!(
            DiskStoreDir::open(dir.path()),
            Err(CoreError::StoreLocked { .. })
        ));
    }

    #[test]
    fn readers_share() {
        let dir = tempdir().unwrap();
        drop(DiskStoreDir::create(dir.path()).unwrap());
        let _a = DiskStoreDir::open(dir.path()).unwrap();
        let _b = DiskStoreDir::open(dir.path()).unwrap();
    }

    #[test]
    fn values_round_trip_through_store() {
        let dir = tempdir().unwrap();
        let value = {
            let mut store = DiskStoreDir::create(dir.path()).unwrap();
            store.append_value(b"ignored").unwrap();
            store.append_value(b"payload").unwrap()
        };
        assert_eq!(
            value,
            EntryValue::OnDisk {
                offset: 7,
                length: 7
            }
        );

        let store = DiskStoreDir::open(dir.path()).unwrap();
        let entry = RecoveredEntry::new(value, Stamp::UNSTAMPED);
        assert_eq!(store.materialize(&entry).unwrap().as_ref(), b"payload");

        let missing = RecoveredEntry::on_disk(1000, 4, Stamp::UNSTAMPED);
        assert!(store.materialize(&missing).unwrap_err().is_disk_access());
    }

    #[test]
    fn read_only_store_rejects_writes() {
        let dir = tempdir().unwrap();
        drop(DiskStoreDir::create(dir.path()).unwrap());
        let mut store = DiskStoreDir::open(dir.path()).unwrap();
        assert!(matches!(
            store.append_value(b"x"),
            Err(CoreError::State { .. })
        ));
        assert!(store.create_oplog(OplogId::new(1), VersionTag::V2).is_err());
    }
}
