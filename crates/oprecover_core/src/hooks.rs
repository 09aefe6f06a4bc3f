//! Replay event hooks.

use crate::entry::RecoveredEntry;
use crate::error::CoreResult;
use crate::key::EntryKey;
use crate::table::RecoveryTable;
use crate::types::OplogId;

/// Observer of replay events.
///
/// Every method defaults to doing nothing, so a consumer overrides only
/// the events it cares about. Hooks run before the table is mutated; an
/// error from any hook aborts the pass.
pub trait RecoveryHooks {
    /// A create record was decoded.
    fn on_create(
        &mut self,
        oplog_id: OplogId,
        key: &EntryKey,
        entry: &RecoveredEntry,
    ) -> CoreResult<()> {
        let _ = (oplog_id, key, entry);
        Ok(())
    }

    /// An update record was decoded.
    fn on_update(
        &mut self,
        oplog_id: OplogId,
        key: &EntryKey,
        entry: &RecoveredEntry,
    ) -> CoreResult<()> {
        let _ = (oplog_id, key, entry);
        Ok(())
    }

    /// A destroy record was decoded.
    fn on_destroy(&mut self, oplog_id: OplogId, key: &EntryKey) -> CoreResult<()> {
        let _ = (oplog_id, key);
        Ok(())
    }

    /// Every record of `oplog_id` has been applied to `table`.
    fn on_boundary(&mut self, oplog_id: OplogId, table: &RecoveryTable) -> CoreResult<()> {
        let _ = (oplog_id, table);
        Ok(())
    }
}

/// Hooks that observe nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl RecoveryHooks for NoopHooks {}

impl<H: RecoveryHooks + ?Sized> RecoveryHooks for &mut H {
    fn on_create(
        &mut self,
        oplog_id: OplogId,
        key: &EntryKey,
        entry: &RecoveredEntry,
    ) -> CoreResult<()> {
        (**self).on_create(oplog_id, key, entry)
    }

    fn on_update(
        &mut self,
        oplog_id: OplogId,
        key: &EntryKey,
        entry: &RecoveredEntry,
    ) -> CoreResult<()> {
        (**self).on_update(oplog_id, key, entry)
    }

    fn on_destroy(&mut self, oplog_id: OplogId, key: &EntryKey) -> CoreResult<()> {
        (**self).on_destroy(oplog_id, key)
    }

    fn on_boundary(&mut self, oplog_id: OplogId, table: &RecoveryTable) -> CoreResult<()> {
        (**self).on_boundary(oplog_id, table)
    }
}

impl<H: RecoveryHooks + ?Sized> RecoveryHooks for Box<H> {
    fn on_create(
        &mut self,
        oplog_id: OplogId,
        key: &EntryKey,
        entry: &RecoveredEntry,
    ) -> CoreResult<()> {
        (**self).on_create(oplog_id, key, entry)
    }

    fn on_update(
        &mut self,
        oplog_id: OplogId,
        key: &EntryKey,
        entry: &RecoveredEntry,
    ) -> CoreResult<()> {
        (**self).on_update(oplog_id, key, entry)
    }

    fn on_destroy(&mut self, oplog_id: OplogId, key: &EntryKey) -> CoreResult<()> {
        (**self).on_destroy(oplog_id, key)
    }

    fn on_boundary(&mut self, oplog_id: OplogId, table: &RecoveryTable) -> CoreResult<()> {
        (**self).on_boundary(oplog_id, table)
    }
}
