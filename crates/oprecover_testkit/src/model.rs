//! Reference last-writer-wins model.
//!
//! Applies records straight to an ordered map, with none of the decoding,
//! state machine or hook machinery, so replays can be checked against it.

use oprecover_codec::VersionTag;
use oprecover_core::{
    EntryKey, ExportBatch, OplogId, OplogRecord, RecoveredEntry, RecoveryTable, Stamp,
};
use std::collections::BTreeMap;

/// Entries keyed in a stable order.
pub type EntryMap = BTreeMap<EntryKey, RecoveredEntry>;

/// The expected state after applying a sequence of records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceModel {
    entries: EntryMap,
    version: Option<VersionTag>,
}

impl ReferenceModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a model that drops stamps the way `version` does.
    pub fn for_version(version: VersionTag) -> Self {
        Self {
            entries: EntryMap::new(),
            version: Some(version),
        }
    }

    /// Applies every record of `history` in order.
    pub fn replay(history: &[(OplogId, Vec<OplogRecord>)]) -> Self {
        let mut model = Self::new();
        model.apply_all(history.iter().flat_map(|(_, records)| records));
        model
    }

    /// Applies every record of `history` as written under `version`.
    pub fn replay_as(history: &[(OplogId, Vec<OplogRecord>)], version: VersionTag) -> Self {
        let mut model = Self::for_version(version);
        model.apply_all(history.iter().flat_map(|(_, records)| records));
        model
    }

    /// Applies one record.
    pub fn apply(&mut self, record: &OplogRecord) {
        match record.entry() {
            Some(entry) => {
                let entry = self.as_written(entry);
                self.entries.insert(record.key().clone(), entry);
            }
            None => {
                self.entries.remove(record.key());
            }
        }
    }

    /// Applies records in order.
    pub fn apply_all<'a>(&mut self, records: impl IntoIterator<Item = &'a OplogRecord>) {
        for record in records {
            self.apply(record);
        }
    }

    fn as_written(&self, mut entry: RecoveredEntry) -> RecoveredEntry {
        if self.version.is_some_and(|v| !v.has_stamps()) {
            entry.stamp = Stamp::UNSTAMPED;
        }
        entry
    }

    /// Returns the expected entries.
    pub fn entries(&self) -> &EntryMap {
        &self.entries
    }

    /// Returns true if `table` holds exactly the expected entries.
    pub fn matches(&self, table: &RecoveryTable) -> bool {
        table.len() == self.entries.len()
            && self
                .entries
                .iter()
                .all(|(key, entry)| table.get(key) == Some(entry))
    }

    /// Returns the batches an export of `history` must produce, one per
    /// oplog: the entries whose latest mutation so far fell in that oplog.
    pub fn expected_batches(
        history: &[(OplogId, Vec<OplogRecord>)],
        version: VersionTag,
    ) -> Vec<(OplogId, EntryMap)> {
        let model = Self::for_version(version);
        history
            .iter()
            .map(|(id, records)| {
                let mut batch = EntryMap::new();
                for record in records {
                    match record.entry() {
                        Some(entry) => {
                            batch.insert(record.key().clone(), model.as_written(entry));
                        }
                        None => {
                            batch.remove(record.key());
                        }
                    }
                }
                (*id, batch)
            })
            .collect()
    }
}

/// Copies an export batch into a stable-ordered map.
pub fn batch_to_map(batch: &ExportBatch) -> EntryMap {
    batch
        .iter()
        .map(|(key, entry)| (key.clone(), entry.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::scenario_oplogs;

    #[test]
    fn scenario_model() {
        let model = ReferenceModel::replay(&scenario_oplogs());
        assert_eq!(model.entries().len(), 1);
        assert!(model.entries().contains_key(&EntryKey::from("k1")));
    }

    #[test]
    fn scenario_batches() {
        let batches = ReferenceModel::expected_batches(&scenario_oplogs(), VersionTag::V2);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].1.len(), 2);
        assert_eq!(batches[1].1.len(), 1);
    }

    #[test]
    fn v1_model_drops_stamps() {
        let mut model = ReferenceModel::for_version(VersionTag::V1);
        model.apply(&OplogRecord::create("k", &b"v"[..], Stamp::new(5, 5)));
        assert!(model.entries()[&EntryKey::from("k")].stamp.is_unstamped());
    }
}
