//! Export writers for tests.

use crate::model::{batch_to_map, EntryMap};
use oprecover_core::{ExportBatch, ExportWriter, OplogId};
use std::io;

/// Keeps a copy of every batch it is handed.
#[derive(Debug, Clone, Default)]
pub struct RecordingWriter {
    /// Batches in the order they were written.
    pub batches: Vec<(OplogId, EntryMap)>,
}

impl RecordingWriter {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the oplog ids of the recorded batches.
    pub fn oplog_ids(&self) -> Vec<OplogId> {
        self.batches.iter().map(|(id, _)| *id).collect()
    }
}

impl ExportWriter for RecordingWriter {
    fn write_batch(&mut self, oplog_id: OplogId, batch: &ExportBatch) -> io::Result<()> {
        self.batches.push((oplog_id, batch_to_map(batch)));
        Ok(())
    }
}

/// Fails when handed the batch of a chosen oplog.
#[derive(Debug, Clone)]
pub struct FailingWriter {
    fail_at: OplogId,
    /// Oplogs whose batches were offered, including the failing one.
    pub calls: Vec<OplogId>,
}

impl FailingWriter {
    /// Creates a writer that fails on `fail_at`'s batch.
    pub fn at(fail_at: OplogId) -> Self {
        Self {
            fail_at,
            calls: Vec::new(),
        }
    }
}

impl ExportWriter for FailingWriter {
    fn write_batch(&mut self, oplog_id: OplogId, _batch: &ExportBatch) -> io::Result<()> {
        self.calls.push(oplog_id);
        if oplog_id == self.fail_at {
            Err(io::Error::new(
                io::ErrorKind::Other,
                format!("injected failure at {oplog_id}"),
            ))
        } else {
            Ok(())
        }
    }
}
