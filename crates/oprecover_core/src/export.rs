//! Streaming export of a replay.
//!
//! [`ExportOverlay`] rides on top of a [`ValidatingOverlay`] and collects
//! the entries touched in the current oplog into an [`ExportBatch`]. At each
//! oplog boundary the batch goes to an [`ExportWriter`] and is then cleared,
//! so working memory is bounded by one oplog's mutations. Flushed batches
//! are never revisited: a key rewritten in a later oplog simply appears
//! again in that oplog's batch.

use crate::entry::RecoveredEntry;
use crate::error::{CoreError, CoreResult};
use crate::hooks::RecoveryHooks;
use crate::key::EntryKey;
use crate::table::RecoveryTable;
use crate::types::OplogId;
use crate::validate::{ValidatingOverlay, ValidationReport};
use serde::Serialize;
use std::collections::hash_map::{self, HashMap};
use std::io;
use tracing::debug;

/// Entries whose latest mutation fell in the oplog just completed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportBatch {
    entries: HashMap<EntryKey, RecoveredEntry>,
}

impl ExportBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, key: EntryKey, entry: RecoveredEntry) {
        self.entries.insert(key, entry);
    }

    pub(crate) fn remove(&mut self, key: &EntryKey) {
        self.entries.remove(key);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the entry for `key`.
    #[must_use]
    pub fn get(&self, key: &EntryKey) -> Option<&RecoveredEntry> {
        self.entries.get(key)
    }

    /// Returns true if `key` is in the batch.
    #[must_use]
    pub fn contains_key(&self, key: &EntryKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over entries in arbitrary order.
    pub fn iter(&self) -> hash_map::Iter<'_, EntryKey, RecoveredEntry> {
        self.entries.iter()
    }

    /// Returns the entries ordered by key.
    #[must_use]
    pub fn sorted(&self) -> Vec<(&EntryKey, &RecoveredEntry)> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

impl<'a> IntoIterator for &'a ExportBatch {
    type Item = (&'a EntryKey, &'a RecoveredEntry);
    type IntoIter = hash_map::Iter<'a, EntryKey, RecoveredEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Destination for exported batches.
pub trait ExportWriter {
    /// Writes one oplog's batch.
    ///
    /// # Errors
    ///
    /// Any error aborts the recovery pass.
    fn write_batch(&mut self, oplog_id: OplogId, batch: &ExportBatch) -> io::Result<()>;
}

impl<W: ExportWriter + ?Sized> ExportWriter for &mut W {
    fn write_batch(&mut self, oplog_id: OplogId, batch: &ExportBatch) -> io::Result<()> {
        (**self).write_batch(oplog_id, batch)
    }
}

impl<W: ExportWriter + ?Sized> ExportWriter for Box<W> {
    fn write_batch(&mut self, oplog_id: OplogId, batch: &ExportBatch) -> io::Result<()> {
        (**self).write_batch(oplog_id, batch)
    }
}

/// Export counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportStats {
    /// Batches handed to the writer.
    pub batches: u64,
    /// Entries across all batches.
    pub entries: u64,
}

/// Replay consumer that validates, then exports per oplog.
#[derive(Debug)]
pub struct ExportOverlay<W: ExportWriter> {
    base: ValidatingOverlay,
    batch: ExportBatch,
    writer: W,
    stats: ExportStats,
}

impl<W: ExportWriter> ExportOverlay<W> {
    /// Creates an overlay exporting to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            base: ValidatingOverlay::new(),
            batch: ExportBatch::new(),
            writer,
            stats: ExportStats::default(),
        }
    }

    /// Returns the batch being collected.
    #[must_use]
    pub fn batch(&self) -> &ExportBatch {
        &self.batch
    }

    /// Returns the validation counters.
    #[must_use]
    pub fn validation(&self) -> &ValidationReport {
        self.base.report()
    }

    /// Returns the export counters.
    #[must_use]
    pub fn stats(&self) -> ExportStats {
        self.stats
    }

    /// Returns the writer.
    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Returns the writer mutably.
    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Consumes the overlay, returning the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl<W: ExportWriter> RecoveryHooks for ExportOverlay<W> {
    fn on_create(
        &mut self,
        oplog_id: OplogId,
        key: &EntryKey,
        entry: &RecoveredEntry,
    ) -> CoreResult<()> {
        self.base.on_create(oplog_id, key, entry)?;
        self.batch.insert(key.clone(), entry.clone());
        Ok(())
    }

    fn on_update(
        &mut self,
        oplog_id: OplogId,
        key: &EntryKey,
        entry: &RecoveredEntry,
    ) -> CoreResult<()> {
        self.base.on_update(oplog_id, key, entry)?;
        self.batch.insert(key.clone(), entry.clone());
        Ok(())
    }

    fn on_destroy(&mut self, oplog_id: OplogId, key: &EntryKey) -> CoreResult<()> {
        self.base.on_destroy(oplog_id, key)?;
        self.batch.remove(key);
        Ok(())
    }

    fn on_boundary(&mut self, oplog_id: OplogId, table: &RecoveryTable) -> CoreResult<()> {
        self.base.on_boundary(oplog_id, table)?;

        self.writer
            .write_batch(oplog_id, &self.batch)
            .map_err(|source| CoreError::ExportSink { oplog_id, source })?;

        debug!(oplog = %oplog_id, entries = self.batch.len(), "export batch written");
        self.stats.batches += 1;
        self.stats.entries += self.batch.len() as u64;
        self.batch.clear();
        Ok(())
    }
}
