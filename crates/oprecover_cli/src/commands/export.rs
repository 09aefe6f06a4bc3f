//! Export command implementation.

use oprecover_codec::Value;
use oprecover_core::{
    DiskStoreDir, ExportBatch, ExportOverlay, ExportWriter, OplogId, Recovery, RecoveryConfig,
};
use oprecover_storage::StorageBackend;
use serde::Serialize;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

/// One exported entry, serialized as a single JSON line.
#[derive(Debug, Serialize)]
struct ExportLine {
    oplog: u64,
    key: serde_json::Value,
    value: String,
    entry_version: u32,
    region_version: u64,
    deferred: bool,
}

/// Writes each batch as JSON lines, ordered by key.
///
/// Deferred values are faulted in from the store's value file.
pub struct JsonLinesWriter<'a, W: Write> {
    out: W,
    values: &'a dyn StorageBackend,
    lines: u64,
}

impl<'a, W: Write> JsonLinesWriter<'a, W> {
    /// Creates a writer resolving deferred values against `values`.
    pub fn new(out: W, values: &'a dyn StorageBackend) -> Self {
        Self {
            out,
            values,
            lines: 0,
        }
    }

    /// Returns the number of lines written.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Consumes the writer, returning the output.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ExportWriter for JsonLinesWriter<'_, W> {
    fn write_batch(&mut self, oplog_id: OplogId, batch: &ExportBatch) -> io::Result<()> {
        for (key, entry) in batch.sorted() {
            let bytes = entry
                .materialize(self.values)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            let line = ExportLine {
                oplog: oplog_id.as_u64(),
                key: value_to_json(key.as_value()),
                value: hex_encode(&bytes),
                entry_version: entry.stamp.entry_version,
                region_version: entry.stamp.region_version,
                deferred: entry.value.is_deferred(),
            };
            serde_json::to_writer(&mut self.out, &line)?;
            self.out.write_all(b"\n")?;
            self.lines += 1;
        }
        self.out.flush()
    }
}

/// Runs the export command.
///
/// File output goes to a temporary file beside the target, which replaces
/// the target only once the pass succeeds.
pub fn run(
    path: &Path,
    config: RecoveryConfig,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Exporting disk store at {:?}", path);

    let store = DiskStoreDir::open(path)?;
    match output {
        Some(file) => {
            let dir = file
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let temp = NamedTempFile::new_in(dir)?;
            let out = export_to(&store, config, BufWriter::new(temp))?;
            let temp = out.into_inner().map_err(|e| e.into_error())?;
            temp.persist(file)?;
        }
        None => {
            export_to(&store, config, io::stdout().lock())?;
        }
    }
    Ok(())
}

fn export_to<W: Write>(
    store: &DiskStoreDir,
    config: RecoveryConfig,
    out: W,
) -> Result<W, Box<dyn std::error::Error>> {
    let mut overlay = ExportOverlay::new(JsonLinesWriter::new(out, store.value_store()));
    let region = Recovery::new(config).run(store, &mut overlay)?;

    let writer = overlay.into_writer();
    info!(
        "Exported {} lines from {} oplogs ({} live keys)",
        writer.lines(),
        region.stats.oplogs,
        region.stats.live_entries
    );
    Ok(writer.into_inner())
}

/// Maps a key to JSON. Bytes become `{"bytes": "<hex>"}` so they never
/// collide with text keys.
fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(n) => serde_json::Value::from(*n),
        Value::Bytes(bytes) => serde_json::json!({ "bytes": hex_encode(bytes) }),
        Value::Text(text) => serde_json::Value::String(text.clone()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use oprecover_codec::VersionTag;
    use oprecover_core::{MemoryOplogSource, OplogRecord, Stamp};
    use oprecover_storage::InMemoryBackend;

    fn export(source: &MemoryOplogSource, values: &InMemoryBackend) -> (Vec<serde_json::Value>, oprecover_core::CoreResult<()>) {
        let mut overlay = ExportOverlay::new(JsonLinesWriter::new(Vec::new(), values));
        let result = Recovery::new(RecoveryConfig::default())
            .run(source, &mut overlay)
            .map(|_| ());
        let out = overlay.into_writer().into_inner();
        let lines = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (lines, result)
    }

    #[test]
    fn writes_sorted_lines_per_batch() {
        let mut source = MemoryOplogSource::new("s");
        source
            .add_oplog(
                OplogId::new(1),
                VersionTag::V2,
                &[
                    OplogRecord::create("b", &b"\x01"[..], Stamp::new(1, 1)),
                    OplogRecord::create("a", &b"\x02"[..], Stamp::new(1, 2)),
                ],
            )
            .unwrap();
        source
            .add_oplog(
                OplogId::new(2),
                VersionTag::V2,
                &[OplogRecord::Create {
                    key: 5i64.into(),
                    value: oprecover_core::EntryValue::OnDisk {
                        offset: 1,
                        length: 2,
                    },
                    stamp: Stamp::new(1, 3),
                }],
            )
            .unwrap();

        let values = InMemoryBackend::with_data(vec![0x00, 0xab, 0xcd]);
        let (lines, result) = export(&source, &values);
        result.unwrap();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["key"], "a");
        assert_eq!(lines[0]["value"], "02");
        assert_eq!(lines[1]["key"], "b");
        assert_eq!(lines[2]["oplog"], 2);
        assert_eq!(lines[2]["key"], 5);
        assert_eq!(lines[2]["value"], "abcd");
        assert_eq!(lines[2]["deferred"], true);
    }

    #[test]
    fn unreadable_value_aborts_export() {
        let mut source = MemoryOplogSource::new("s");
        source
            .add_oplog(
                OplogId::new(1),
                VersionTag::V2,
                &[OplogRecord::Create {
                    key: "k".into(),
                    value: oprecover_core::EntryValue::OnDisk {
                        offset: 100,
                        length: 2,
                    },
                    stamp: Stamp::UNSTAMPED,
                }],
            )
            .unwrap();

        let (lines, result) = export(&source, &InMemoryBackend::new());
        assert!(lines.is_empty());
        assert!(result.unwrap_err().is_disk_access());
    }

    #[test]
    fn json_keys() {
        let key = Value::Array(vec![Value::from("t"), Value::Bytes(vec![0xff]), Value::Bool(true)]);
        assert_eq!(
            value_to_json(&key),
            serde_json::json!(["t", { "bytes": "ff" }, true])
        );
    }

    #[test]
    fn text_and_bytes_keys_export_distinctly() {
        let mut source = MemoryOplogSource::new("s");
        source
            .add_oplog(
                OplogId::new(1),
                VersionTag::V2,
                &[
                    OplogRecord::create("0xff", &b"\x01"[..], Stamp::new(1, 1)),
                    OplogRecord::create(vec![0xffu8], &b"\x02"[..], Stamp::new(1, 2)),
                ],
            )
            .unwrap();

        let (lines, result) = export(&source, &InMemoryBackend::new());
        result.unwrap();

        assert_eq!(lines.len(), 2);
        assert_ne!(lines[0]["key"], lines[1]["key"]);
        let keys: Vec<_> = lines.iter().map(|l| l["key"].clone()).collect();
        assert!(keys.contains(&serde_json::json!("0xff")));
        assert!(keys.contains(&serde_json::json!({ "bytes": "ff" })));
    }

    mod to_file {
        use super::*;
        use oprecover_core::{EntryKey, OplogRecordType};
        use oprecover_testkit::{null_value_segment, scenario_oplogs, TestStore};

        fn dir_entries(dir: &Path) -> Vec<std::ffi::OsString> {
            std::fs::read_dir(dir)
                .unwrap()
                .map(|e| e.unwrap().file_name())
                .collect()
        }

        #[test]
        fn successful_export_lands_at_target() {
            let store = TestStore::new("store");
            store.write_history(VersionTag::V2, &scenario_oplogs());
            let out_dir = tempfile::tempdir().unwrap();
            let target = out_dir.path().join("export.jsonl");

            run(store.path(), RecoveryConfig::default(), Some(&target)).unwrap();

            let text = std::fs::read_to_string(&target).unwrap();
            assert_eq!(text.lines().count(), 3);
            assert_eq!(dir_entries(out_dir.path()), vec![target.file_name().unwrap().to_owned()]);
        }

        #[test]
        fn aborted_export_leaves_no_file() {
            let store = TestStore::new("store");
            store.write_history(VersionTag::V2, &scenario_oplogs());
            store.write_raw_oplog(
                OplogId::new(3),
                &null_value_segment(
                    OplogId::new(3),
                    VersionTag::V2,
                    OplogRecordType::Update,
                    &EntryKey::from("k1"),
                ),
            );
            let out_dir = tempfile::tempdir().unwrap();
            let target = out_dir.path().join("export.jsonl");

            assert!(run(store.path(), RecoveryConfig::default(), Some(&target)).is_err());
            assert!(!target.exists());
            assert!(dir_entries(out_dir.path()).is_empty());
        }
    }
}
