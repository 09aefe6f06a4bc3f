//! Test fixtures and disk store helpers.
//!
//! Provides convenience functions for setting up disk stores and the
//! canned scenarios tests keep coming back to.

use bytes::Bytes;
use oprecover_codec::{ValueCodec, VersionTag, VersionedWriter};
use oprecover_core::oplog::{frame_record, SegmentHeader};
use oprecover_core::{
    DiskStoreDir, EntryKey, EntryValue, MemoryOplogSource, OplogId, OplogRecord, OplogRecordType,
    Stamp,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Oplogs with their records, in replay order.
pub type OplogHistory = Vec<(OplogId, Vec<OplogRecord>)>;

/// A disk store in a temporary directory.
///
/// Every write reopens the store with its exclusive lock and releases it
/// afterwards, so [`TestStore::open`] can be called between writes.
pub struct TestStore {
    path: PathBuf,
    _temp_dir: TempDir,
}

impl TestStore {
    /// Creates an empty store named `name`.
    pub fn new(name: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join(name);
        DiskStoreDir::create(&path).expect("Failed to create disk store");
        Self {
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the store directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes one oplog segment.
    pub fn write_oplog(&self, id: OplogId, version: VersionTag, records: &[OplogRecord]) {
        let store = DiskStoreDir::create(&self.path).expect("Failed to lock disk store");
        let mut writer = store
            .create_oplog(id, version)
            .expect("Failed to create oplog");
        for record in records {
            writer.append(record).expect("Failed to append record");
        }
        writer.sync().expect("Failed to sync oplog");
    }

    /// Writes every oplog of `history` under `version`.
    pub fn write_history(&self, version: VersionTag, history: &[(OplogId, Vec<OplogRecord>)]) {
        for (id, records) in history {
            self.write_oplog(*id, version, records);
        }
    }

    /// Writes raw bytes as oplog `id`'s segment file.
    pub fn write_raw_oplog(&self, id: OplogId, bytes: &[u8]) {
        let store = DiskStoreDir::create(&self.path).expect("Failed to lock disk store");
        std::fs::write(store.oplog_path(id), bytes).expect("Failed to write oplog file");
    }

    /// Appends a value to the store's value file.
    pub fn append_value(&self, value: &[u8]) -> EntryValue {
        let mut store = DiskStoreDir::create(&self.path).expect("Failed to lock disk store");
        store.append_value(value).expect("Failed to append value")
    }

    /// Opens the store for reading.
    pub fn open(&self) -> DiskStoreDir {
        DiskStoreDir::open(&self.path).expect("Failed to open disk store")
    }
}

/// Runs a test with a temporary disk store.
///
/// # Example
///
/// ```rust
/// use oprecover_testkit::with_temp_store;
///
/// with_temp_store(|store| {
///     assert!(store.open().list_oplogs().unwrap().is_empty());
/// });
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&TestStore) -> R,
{
    let store = TestStore::new("test-store");
    f(&store)
}

/// Builds an in-memory source holding `history` encoded under `version`.
pub fn memory_source(
    name: &str,
    version: VersionTag,
    history: &[(OplogId, Vec<OplogRecord>)],
) -> MemoryOplogSource {
    let mut source = MemoryOplogSource::new(name);
    for (id, records) in history {
        source
            .add_oplog(*id, version, records)
            .expect("Failed to encode oplog");
    }
    source
}

/// The two-oplog scenario: creates in the first, an update and a destroy
/// in the second.
///
/// Replaying it leaves only `k1 = "c"`.
pub fn scenario_oplogs() -> OplogHistory {
    vec![
        (
            OplogId::new(1),
            vec![
                OplogRecord::create("k1", &b"a"[..], Stamp::new(1, 1)),
                OplogRecord::create("k2", &b"b"[..], Stamp::new(1, 2)),
            ],
        ),
        (
            OplogId::new(2),
            vec![
                OplogRecord::update("k1", &b"c"[..], Stamp::new(2, 3)),
                OplogRecord::destroy("k2"),
            ],
        ),
    ]
}

/// Encodes a create or update payload whose value is null.
///
/// No well-formed writer produces this; decoding it must fail.
pub fn null_value_payload(key: &EntryKey, version: VersionTag) -> Bytes {
    let mut writer = VersionedWriter::new(version);
    writer
        .write_object(&ValueCodec, key.as_value())
        .expect("Failed to encode key");
    writer.write_u8(0);
    if version.has_stamps() {
        writer.write_u32(1);
        writer.write_u64(1);
    }
    writer.into_bytes()
}

/// Encodes a one-record segment whose record carries a null value.
pub fn null_value_segment(
    id: OplogId,
    version: VersionTag,
    record_type: OplogRecordType,
    key: &EntryKey,
) -> Vec<u8> {
    let payload = null_value_payload(key, version);
    let mut bytes = SegmentHeader::new(id, version).encode().to_vec();
    bytes.extend(frame_record(record_type.as_byte(), &payload).expect("Failed to frame record"));
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use oprecover_core::OplogSource;

    #[test]
    fn test_store_round_trip() {
        with_temp_store(|store| {
            store.write_history(VersionTag::V2, &scenario_oplogs());
            let ids = store.open().list_oplogs().unwrap();
            assert_eq!(ids.len(), 2);
        });
    }

    #[test]
    fn memory_source_holds_history() {
        let source = memory_source("m", VersionTag::V1, &scenario_oplogs());
        assert_eq!(
            source.oplog_ids().unwrap(),
            vec![OplogId::new(1), OplogId::new(2)]
        );
    }
}
