//! The recovery table.

use crate::entry::RecoveredEntry;
use crate::key::EntryKey;
use std::collections::hash_map::{self, HashMap};

/// Latest known state of every live key during one replay pass.
///
/// A destroyed key is absent. The table is only mutated by
/// [`Recovery`](crate::Recovery); hooks observe it read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryTable {
    entries: HashMap<EntryKey, RecoveredEntry>,
}

impl RecoveryTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs or overwrites the entry for `key`, returning the old one.
    pub(crate) fn install(&mut self, key: EntryKey, entry: RecoveredEntry) -> Option<RecoveredEntry> {
        self.entries.insert(key, entry)
    }

    /// Removes `key`, returning its entry if it was live.
    pub(crate) fn remove(&mut self, key: &EntryKey) -> Option<RecoveredEntry> {
        self.entries.remove(key)
    }

    /// Returns the entry for `key`.
    #[must_use]
    pub fn get(&self, key: &EntryKey) -> Option<&RecoveredEntry> {
        self.entries.get(key)
    }

    /// Returns true if `key` is live.
    #[must_use]
    pub fn contains_key(&self, key: &EntryKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no key is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over live entries in arbitrary order.
    pub fn iter(&self) -> hash_map::Iter<'_, EntryKey, RecoveredEntry> {
        self.entries.iter()
    }

    /// Iterates over live keys in arbitrary order.
    pub fn keys(&self) -> hash_map::Keys<'_, EntryKey, RecoveredEntry> {
        self.entries.keys()
    }

    /// Consumes the table, returning its entries.
    #[must_use]
    pub fn into_entries(self) -> HashMap<EntryKey, RecoveredEntry> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a RecoveryTable {
    type Item = (&'a EntryKey, &'a RecoveredEntry);
    type IntoIter = hash_map::Iter<'a, EntryKey, RecoveredEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
