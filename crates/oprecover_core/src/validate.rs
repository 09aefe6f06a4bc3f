//! Structural validation of a replay.

use crate::entry::RecoveredEntry;
use crate::error::{CoreError, CoreResult};
use crate::hooks::RecoveryHooks;
use crate::key::EntryKey;
use crate::table::RecoveryTable;
use crate::types::OplogId;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyState {
    Live,
    Destroyed,
}

/// Counters gathered while validating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Oplogs whose boundary was reached.
    pub oplogs: u64,
    /// Create records seen.
    pub creates: u64,
    /// Update records seen.
    pub updates: u64,
    /// Destroy records seen.
    pub destroys: u64,
    /// Destroys of keys never seen in the pass.
    pub noop_destroys: u64,
    /// Creates and updates whose value lives in the value store.
    pub deferred_values: u64,
    /// Live keys at the last boundary.
    pub live_keys: u64,
}

/// Replay consumer that checks the mutation history is well formed.
///
/// Only per-key liveness is tracked; values are never materialized, so a
/// region can be validated in memory proportional to its key count.
///
/// Rules:
///
/// - create of a live key is corruption (duplicate create)
/// - destroy of a key already destroyed in this pass is corruption
/// - destroy of a key never seen is a no-op
/// - update of any key, and create after destroy, are allowed
///
/// At every boundary the number of live keys must match the table.
#[derive(Debug, Default)]
pub struct ValidatingOverlay {
    keys: HashMap<EntryKey, KeyState>,
    live: u64,
    report: ValidationReport,
}

impl ValidatingOverlay {
    /// Creates an overlay that has seen nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counters so far.
    #[must_use]
    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    /// Consumes the overlay, returning its report.
    #[must_use]
    pub fn into_report(self) -> ValidationReport {
        self.report
    }

    /// Returns true if `key` is live as far as this overlay has seen.
    #[must_use]
    pub fn is_live(&self, key: &EntryKey) -> bool {
        self.keys.get(key) == Some(&KeyState::Live)
    }

    fn mark_live(&mut self, key: &EntryKey) {
        if self.keys.insert(key.clone(), KeyState::Live) != Some(KeyState::Live) {
            self.live += 1;
        }
    }
}

impl RecoveryHooks for ValidatingOverlay {
    fn on_create(
        &mut self,
        oplog_id: OplogId,
        key: &EntryKey,
        entry: &RecoveredEntry,
    ) -> CoreResult<()> {
        if self.is_live(key) {
            return Err(CoreError::corruption_at(
                oplog_id,
                Some(key.clone()),
                "duplicate create of a live key",
            ));
        }
        self.mark_live(key);
        self.report.creates += 1;
        if entry.value.is_deferred() {
            self.report.deferred_values += 1;
        }
        Ok(())
    }

    fn on_update(
        &mut self,
        _oplog_id: OplogId,
        key: &EntryKey,
        entry: &RecoveredEntry,
    ) -> CoreResult<()> {
        self.mark_live(key);
        self.report.updates += 1;
        if entry.value.is_deferred() {
            self.report.deferred_values += 1;
        }
        Ok(())
    }

    fn on_destroy(&mut self, oplog_id: OplogId, key: &EntryKey) -> CoreResult<()> {
        self.report.destroys += 1;
        match self.keys.get_mut(key) {
            Some(state @ KeyState::Live) => {
                *state = KeyState::Destroyed;
                self.live -= 1;
                Ok(())
            }
            Some(KeyState::Destroyed) => Err(CoreError::corruption_at(
                oplog_id,
                Some(key.clone()),
                "destroy of an already destroyed key",
            )),
            None => {
                self.report.noop_destroys += 1;
                Ok(())
            }
        }
    }

    fn on_boundary(&mut self, oplog_id: OplogId, table: &RecoveryTable) -> CoreResult<()> {
        if self.live != table.len() as u64 {
            return Err(CoreError::corruption_at(
                oplog_id,
                None,
                format!(
                    "{} live keys tracked but the table holds {}",
                    self.live,
                    table.len()
                ),
            ));
        }
        self.report.oplogs += 1;
        self.report.live_keys = self.live;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Stamp;

    fn entry() -> RecoveredEntry {
        RecoveredEntry::inline(&b"v"[..], Stamp::UNSTAMPED)
    }

    const OPLOG: OplogId = OplogId::new(1);

    #[test]
    fn duplicate_create_rejected() {
        let mut overlay = ValidatingOverlay::new();
        let k = EntryKey::from("k");
        overlay.on_create(OPLOG, &k, &entry()).unwrap();
        let err = overlay.on_create(OPLOG, &k, &entry()).unwrap_err();
        assert!(err.is_corruption());
        assert_eq!(err.key(), Some(&k));
    }

    #[test]
    fn recreate_after_destroy_allowed() {
        let mut overlay = ValidatingOverlay::new();
        let k = EntryKey::from("k");
        overlay.on_create(OPLOG, &k, &entry()).unwrap();
        overlay.on_destroy(OPLOG, &k).unwrap();
        overlay.on_create(OPLOG, &k, &entry()).unwrap();
        assert!(overlay.is_live(&k));
    }

    #[test]
    fn double_destroy_rejected() {
        let mut overlay = ValidatingOverlay::new();
        let k = EntryKey::from("k");
        overlay.on_update(OPLOG, &k, &entry()).unwrap();
        overlay.on_destroy(OPLOG, &k).unwrap();
        assert!(overlay.on_destroy(OPLOG, &k).unwrap_err().is_corruption());
    }

    #[test]
    fn unknown_destroy_is_noop() {
        let mut overlay = ValidatingOverlay::new();
        let k = EntryKey::from("never");
        overlay.on_destroy(OPLOG, &k).unwrap();
        overlay.on_destroy(OPLOG, &k).unwrap();
        assert_eq!(overlay.report().noop_destroys, 2);
        overlay.on_boundary(OPLOG, &RecoveryTable::new()).unwrap();
    }

    #[test]
    fn boundary_checks_live_count() {
        let mut overlay = ValidatingOverlay::new();
        overlay
            .on_create(OPLOG, &EntryKey::from("k"), &entry())
            .unwrap();
        let err = overlay.on_boundary(OPLOG, &RecoveryTable::new()).unwrap_err();
        assert!(err.is_corruption());
    }
}
