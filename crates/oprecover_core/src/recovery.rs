//! The recovery state machine.
//!
//! A pass visits a region's oplogs in ascending id order:
//!
//! ```text
//! Idle -> Recovering(1) -> BoundaryReached(1) -> Recovering(2) -> ... -> Done
//! ```
//!
//! Each record is offered to the hooks and then applied to the
//! [`RecoveryTable`] with last-writer-wins semantics. When an oplog's records
//! are exhausted the hooks see a boundary event with the table as it stands.
//!
//! ## Invariants
//!
//! - Oplog ids strictly increase across `begin_oplog` calls
//! - Between records the table reflects exactly the records applied so far
//! - A destroyed key is absent from the table
//! - Any error aborts the pass; [`Recovery::run`] never returns a partial table

use crate::config::RecoveryConfig;
use crate::entry::RecoveredEntry;
use crate::error::{CoreError, CoreResult};
use crate::hooks::RecoveryHooks;
use crate::oplog::{OplogDecoder, OplogRecord};
use crate::source::OplogSource;
use crate::table::RecoveryTable;
use crate::types::OplogId;
use oprecover_codec::VersionedReader;
use oprecover_storage::ByteSource;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// Where a pass stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    /// No oplog has been started.
    Idle,
    /// Records of this oplog are being applied.
    Recovering(OplogId),
    /// This oplog has been fully applied.
    BoundaryReached(OplogId),
    /// The pass is over.
    Done,
}

impl fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Recovering(id) => write!(f, "recovering {id}"),
            Self::BoundaryReached(id) => write!(f, "boundary of {id}"),
            Self::Done => f.write_str("done"),
        }
    }
}

/// Counters for a recovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryStats {
    /// Oplogs fully replayed.
    pub oplogs: u64,
    /// Records applied.
    pub records: u64,
    /// Create records applied.
    pub creates: u64,
    /// Update records applied.
    pub updates: u64,
    /// Destroy records applied.
    pub destroys: u64,
    /// Destroys of keys that were not live.
    pub noop_destroys: u64,
    /// Live keys at the end of the pass.
    pub live_entries: u64,
}

/// The outcome of a successful pass.
#[derive(Debug, Clone)]
pub struct RecoveredRegion {
    /// Final state of every live key.
    pub table: RecoveryTable,
    /// Pass counters.
    pub stats: RecoveryStats,
    /// The last oplog replayed, if any.
    pub last_oplog: Option<OplogId>,
}

/// Drives one replay pass over a region's oplogs.
///
/// # Example
///
/// ```
/// use oprecover_core::{
///     MemoryOplogSource, NoopHooks, OplogId, OplogRecord, Recovery, RecoveryConfig, Stamp,
/// };
/// use oprecover_codec::VersionTag;
///
/// let mut source = MemoryOplogSource::new("example");
/// source
///     .add_oplog(
///         OplogId::new(1),
///         VersionTag::CURRENT,
///         &[OplogRecord::create("k1", &b"a"[..], Stamp::new(1, 1))],
///     )
///     .unwrap();
///
/// let region = Recovery::new(RecoveryConfig::default())
///     .run(&source, &mut NoopHooks)
///     .unwrap();
/// assert_eq!(region.table.len(), 1);
/// ```
#[derive(Debug)]
pub struct Recovery {
    config: RecoveryConfig,
    state: RecoveryState,
    table: RecoveryTable,
    stats: RecoveryStats,
    last_oplog: Option<OplogId>,
}

impl Recovery {
    /// Creates an idle pass.
    #[must_use]
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            state: RecoveryState::Idle,
            table: RecoveryTable::new(),
            stats: RecoveryStats::default(),
            last_oplog: None,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> RecoveryState {
        self.state
    }

    /// Returns the table as it stands.
    #[must_use]
    pub fn table(&self) -> &RecoveryTable {
        &self.table
    }

    /// Returns the counters so far.
    #[must_use]
    pub fn stats(&self) -> RecoveryStats {
        RecoveryStats {
            live_entries: self.table.len() as u64,
            ..self.stats
        }
    }

    /// Starts applying oplog `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::State`] unless the pass is idle or at the
    /// boundary of an oplog with a smaller id.
    pub fn begin_oplog(&mut self, id: OplogId) -> CoreResult<()> {
        match self.state {
            RecoveryState::Idle => {}
            RecoveryState::BoundaryReached(prev) if id > prev => {}
            RecoveryState::BoundaryReached(prev) => {
                return Err(CoreError::state(format!(
                    "{id} is not after {prev}; oplogs must be replayed in ascending order"
                )));
            }
            state => {
                return Err(CoreError::state(format!("cannot begin {id} while {state}")));
            }
        }

        debug!(oplog = %id, "replaying oplog");
        self.state = RecoveryState::Recovering(id);
        Ok(())
    }

    fn current_oplog(&self, operation: &str) -> CoreResult<OplogId> {
        match self.state {
            RecoveryState::Recovering(id) => Ok(id),
            state => Err(CoreError::state(format!("cannot {operation} while {state}"))),
        }
    }

    /// Offers `record` to `hooks`, then applies it to the table.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::State`] outside an oplog, or the first hook error.
    pub fn apply<H: RecoveryHooks + ?Sized>(
        &mut self,
        record: OplogRecord,
        hooks: &mut H,
    ) -> CoreResult<()> {
        let id = self.current_oplog("apply a record")?;

        match record {
            OplogRecord::Create { key, value, stamp } => {
                let entry = RecoveredEntry::new(value, stamp);
                hooks.on_create(id, &key, &entry)?;
                self.table.install(key, entry);
                self.stats.creates += 1;
            }
            OplogRecord::Update { key, value, stamp } => {
                let entry = RecoveredEntry::new(value, stamp);
                hooks.on_update(id, &key, &entry)?;
                self.table.install(key, entry);
                self.stats.updates += 1;
            }
            OplogRecord::Destroy { key } => {
                hooks.on_destroy(id, &key)?;
                if self.table.remove(&key).is_none() {
                    self.stats.noop_destroys += 1;
                }
                self.stats.destroys += 1;
            }
        }

        self.stats.records += 1;
        Ok(())
    }

    /// Finishes the current oplog and fires the boundary event.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::State`] outside an oplog, or the hook's error.
    pub fn end_oplog<H: RecoveryHooks + ?Sized>(&mut self, hooks: &mut H) -> CoreResult<()> {
        let id = self.current_oplog("end an oplog")?;

        hooks.on_boundary(id, &self.table)?;

        self.state = RecoveryState::BoundaryReached(id);
        self.last_oplog = Some(id);
        self.stats.oplogs += 1;
        debug!(oplog = %id, live = self.table.len(), "oplog boundary reached");
        Ok(())
    }

    /// Replays every record of oplog `id` read from `reader`.
    ///
    /// The reader is closed once the oplog's records are exhausted.
    ///
    /// # Errors
    ///
    /// Returns the first decode, hook, or state error.
    pub fn replay_oplog<S: ByteSource, H: RecoveryHooks + ?Sized>(
        &mut self,
        id: OplogId,
        reader: VersionedReader<S>,
        hooks: &mut H,
    ) -> CoreResult<()> {
        self.begin_oplog(id)?;

        let mut decoder = OplogDecoder::new(reader, id, self.config);
        for record in &mut decoder {
            self.apply(record?, hooks).map_err(|e| e.in_oplog(id))?;
        }

        decoder
            .into_reader()
            .close()
            .map_err(|e| CoreError::from(e).in_oplog(id))?;

        self.end_oplog(hooks).map_err(|e| e.in_oplog(id))
    }

    /// Ends the pass, handing over the table.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::State`] if an oplog is still open or the pass
    /// has already finished.
    pub fn finish(&mut self) -> CoreResult<RecoveredRegion> {
        match self.state {
            RecoveryState::Idle | RecoveryState::BoundaryReached(_) => {}
            state => return Err(CoreError::state(format!("cannot finish while {state}"))),
        }

        let stats = self.stats();
        self.state = RecoveryState::Done;
        Ok(RecoveredRegion {
            table: std::mem::take(&mut self.table),
            stats,
            last_oplog: self.last_oplog,
        })
    }

    /// Runs a complete pass over every oplog in `source`.
    ///
    /// # Errors
    ///
    /// Any failure aborts the pass and is returned as
    /// [`CoreError::DiskAccess`] naming the store, and the oplog and key
    /// where known.
    pub fn run<O: OplogSource + ?Sized, H: RecoveryHooks + ?Sized>(
        mut self,
        source: &O,
        hooks: &mut H,
    ) -> CoreResult<RecoveredRegion> {
        let store = source.name().to_string();
        let region = self
            .run_pass(source, hooks)
            .map_err(|e| CoreError::disk_access(store.as_str(), e))?;

        info!(
            store = %store,
            oplogs = region.stats.oplogs,
            records = region.stats.records,
            live = region.stats.live_entries,
            "recovery complete"
        );
        Ok(region)
    }

    fn run_pass<O: OplogSource + ?Sized, H: RecoveryHooks + ?Sized>(
        &mut self,
        source: &O,
        hooks: &mut H,
    ) -> CoreResult<RecoveredRegion> {
        let mut ids = source.oplog_ids()?;
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(CoreError::corruption_at(pair[0], None, "duplicate oplog id"));
        }

        for id in ids {
            let reader = source.open_oplog(id).map_err(|e| e.in_oplog(id))?;
            self.replay_oplog(id, reader, hooks)?;
        }

        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::NoopHooks;
    use crate::key::EntryKey;
    use crate::types::Stamp;

    fn key(s: &str) -> EntryKey {
        EntryKey::from(s)
    }

    #[test]
    fn state_transitions() {
        let mut recovery = Recovery::new(RecoveryConfig::default());
        assert_eq!(recovery.state(), RecoveryState::Idle);

        recovery.begin_oplog(OplogId::new(1)).unwrap();
        assert_eq!(recovery.state(), RecoveryState::Recovering(OplogId::new(1)));

        recovery.end_oplog(&mut NoopHooks).unwrap();
        assert_eq!(
            recovery.state(),
            RecoveryState::BoundaryReached(OplogId::new(1))
        );

        let region = recovery.finish().unwrap();
        assert_eq!(recovery.state(), RecoveryState::Done);
        assert_eq!(region.last_oplog, Some(OplogId::new(1)));
    }

    #[test]
    fn oplogs_must_ascend() {
        let mut recovery = Recovery::new(RecoveryConfig::default());
        recovery.begin_oplog(OplogId::new(2)).unwrap();
        recovery.end_oplog(&mut NoopHooks).unwrap();

        assert!(matches!(
            recovery.begin_oplog(OplogId::new(2)),
            Err(CoreError::State { .. })
        ));
        assert!(matches!(
            recovery.begin_oplog(OplogId::new(1)),
            Err(CoreError::State { .. })
        ));
        recovery.begin_oplog(OplogId::new(3)).unwrap();
    }

    #[test]
    fn apply_requires_open_oplog() {
        let mut recovery = Recovery::new(RecoveryConfig::default());
        let err = recovery
            .apply(OplogRecord::destroy("k"), &mut NoopHooks)
            .unwrap_err();
        assert!(matches!(err, CoreError::State { .. }));
    }

    #[test]
    fn cannot_nest_or_finish_mid_oplog() {
        let mut recovery = Recovery::new(RecoveryConfig::default());
        recovery.begin_oplog(OplogId::new(1)).unwrap();
        assert!(recovery.begin_oplog(OplogId::new(2)).is_err());
        assert!(recovery.finish().is_err());
    }

    #[test]
    fn done_is_terminal() {
        let mut recovery = Recovery::new(RecoveryConfig::default());
        recovery.finish().unwrap();
        assert!(recovery.begin_oplog(OplogId::new(1)).is_err());
        assert!(recovery.finish().is_err());
    }

    #[test]
    fn last_writer_wins() {
        let mut recovery = Recovery::new(RecoveryConfig::default());
        let hooks = &mut NoopHooks;

        recovery.begin_oplog(OplogId::new(1)).unwrap();
        recovery
            .apply(OplogRecord::create("k1", &b"a"[..], Stamp::new(1, 1)), hooks)
            .unwrap();
        recovery
            .apply(OplogRecord::create("k2", &b"b"[..], Stamp::new(1, 2)), hooks)
            .unwrap();
        recovery.end_oplog(hooks).unwrap();

        recovery.begin_oplog(OplogId::new(2)).unwrap();
        recovery
            .apply(OplogRecord::update("k1", &b"c"[..], Stamp::new(2, 3)), hooks)
            .unwrap();
        recovery.apply(OplogRecord::destroy("k2"), hooks).unwrap();
        recovery.apply(OplogRecord::destroy("k3"), hooks).unwrap();
        recovery.end_oplog(hooks).unwrap();

        let table = recovery.table();
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get(&key("k1")).unwrap().value.as_inline().unwrap().as_ref(),
            b"c"
        );
        assert!(!table.contains_key(&key("k2")));

        let stats = recovery.stats();
        assert_eq!(stats.records, 5);
        assert_eq!(stats.destroys, 2);
        assert_eq!(stats.noop_destroys, 1);
        assert_eq!(stats.live_entries, 1);
    }

    #[derive(Default)]
    struct FailOnDestroy;

    impl RecoveryHooks for FailOnDestroy {
        fn on_destroy(&mut self, _oplog_id: OplogId, key: &EntryKey) -> CoreResult<()> {
            Err(CoreError::corruption_at(
                OplogId::new(0),
                Some(key.clone()),
                "refused",
            ))
        }
    }

    #[test]
    fn hook_error_leaves_table_untouched() {
        let mut recovery = Recovery::new(RecoveryConfig::default());
        recovery.begin_oplog(OplogId::new(1)).unwrap();
        recovery
            .apply(
                OplogRecord::create("k1", &b"a"[..], Stamp::UNSTAMPED),
                &mut NoopHooks,
            )
            .unwrap();
        assert!(recovery
            .apply(OplogRecord::destroy("k1"), &mut FailOnDestroy)
            .is_err());
        assert!(recovery.table().contains_key(&key("k1")));
    }
}
