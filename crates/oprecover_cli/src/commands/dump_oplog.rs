//! Dump oplog command implementation.

use oprecover_core::oplog::OplogDecoder;
use oprecover_core::{
    DiskStoreDir, EntryValue, OplogId, OplogRecord, OplogSource, RecoveryConfig,
};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Oplog record representation for output.
#[derive(Debug, Serialize)]
pub struct OplogRecordInfo {
    /// Oplog the record belongs to.
    pub oplog: u64,
    /// Format version of the oplog.
    pub format: String,
    /// Position of the record within its oplog.
    pub index: usize,
    /// Record type.
    pub record_type: String,
    /// Entry key.
    pub key: String,
    /// Inline value size in bytes (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_size: Option<usize>,
    /// Offset of a deferred value (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_offset: Option<u64>,
    /// Length of a deferred value (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_length: Option<u32>,
    /// Version stamp (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stamp: Option<String>,
}

/// Runs the dump-oplog command.
pub fn run(
    path: &Path,
    config: RecoveryConfig,
    only: Option<u64>,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Dumping oplogs of {:?}", path);

    let store = DiskStoreDir::open(path)?;
    let mut ids = store.list_oplogs()?;
    ids.sort_unstable();
    if let Some(only) = only {
        ids.retain(|id| id.as_u64() == only);
        if ids.is_empty() {
            return Err(format!("oplog {only} not found").into());
        }
    }

    let max_records = limit.unwrap_or(usize::MAX);
    let mut records = Vec::new();
    let mut failure = None;

    'oplogs: for id in ids {
        let reader = store.open_oplog(id)?;
        let format = reader.version().to_string();
        for (index, result) in OplogDecoder::new(reader, id, config).enumerate() {
            if records.len() >= max_records {
                break 'oplogs;
            }
            match result {
                Ok(record) => records.push(describe(id, &format, index, &record)),
                Err(e) => {
                    failure = Some(e);
                    break 'oplogs;
                }
            }
        }
    }

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(&records);
        }
    }

    match failure {
        Some(e) => {
            eprintln!("✗ Decoding stopped: {e}");
            Err(e.into())
        }
        None => Ok(()),
    }
}

fn describe(id: OplogId, format: &str, index: usize, record: &OplogRecord) -> OplogRecordInfo {
    let mut info = OplogRecordInfo {
        oplog: id.as_u64(),
        format: format.to_string(),
        index,
        record_type: record.record_type().name().to_uppercase(),
        key: record.key().to_string(),
        inline_size: None,
        value_offset: None,
        value_length: None,
        stamp: None,
    };

    if let Some(entry) = record.entry() {
        match entry.value {
            EntryValue::Inline(bytes) => info.inline_size = Some(bytes.len()),
            EntryValue::OnDisk { offset, length } => {
                info.value_offset = Some(offset);
                info.value_length = Some(length);
            }
        }
        if !entry.stamp.is_unstamped() {
            info.stamp = Some(entry.stamp.to_string());
        }
    }

    info
}

fn print_text_output(records: &[OplogRecordInfo]) {
    println!("Oplog Records ({} total)", records.len());
    println!("================");

    let mut current = None;
    for record in records {
        if current != Some(record.oplog) {
            println!();
            println!("oplog:{} ({})", record.oplog, record.format);
            current = Some(record.oplog);
        }

        print!("  [{:06}] {:8} {}", record.index, record.record_type, record.key);

        if let Some(size) = record.inline_size {
            print!(" inline={} bytes", size);
        }
        if let (Some(offset), Some(length)) = (record.value_offset, record.value_length) {
            print!(" on-disk={}+{}", offset, length);
        }
        if let Some(ref stamp) = record.stamp {
            print!(" stamp={}", stamp);
        }

        println!();
    }
}
