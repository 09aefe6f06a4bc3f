//! Property-based test generators using proptest.
//!
//! Provides strategies for generating oplog histories that a validating
//! replay accepts: no create of a live key and no second destroy.

use crate::fixtures::OplogHistory;
use bytes::Bytes;
use oprecover_codec::{Value, VersionTag};
use oprecover_core::{EntryKey, EntryValue, OplogId, OplogRecord, Stamp};
use proptest::prelude::*;
use std::collections::HashMap;

/// Strategy for generating entry keys from a small keyspace.
///
/// Keys collide often, so histories exercise overwrites and destroys.
pub fn key_strategy() -> impl Strategy<Value = EntryKey> {
    prop_oneof![
        3 => (0u8..8).prop_map(|n| EntryKey::from(format!("k{n}"))),
        1 => (0i64..4).prop_map(EntryKey::from),
        1 => (0u8..4).prop_map(|n| EntryKey::from(vec![n])),
        1 => (0u8..3).prop_map(|n| {
            EntryKey::try_from(Value::Array(vec![Value::from("t"), Value::Integer(i64::from(n))]))
                .expect("array keys are never null")
        }),
    ]
}

/// Strategy for generating entry values.
pub fn entry_value_strategy() -> impl Strategy<Value = EntryValue> {
    prop_oneof![
        4 => prop::collection::vec(any::<u8>(), 0..32)
            .prop_map(|bytes| EntryValue::Inline(Bytes::from(bytes))),
        1 => (any::<u64>(), any::<u32>())
            .prop_map(|(offset, length)| EntryValue::OnDisk { offset, length }),
    ]
}

/// Strategy for generating version stamps.
pub fn stamp_strategy() -> impl Strategy<Value = Stamp> {
    (any::<u32>(), any::<u64>()).prop_map(|(e, r)| Stamp::new(e, r))
}

/// Strategy for generating a supported format version.
pub fn version_strategy() -> impl Strategy<Value = VersionTag> {
    prop_oneof![Just(VersionTag::V1), Just(VersionTag::V2)]
}

/// A mutation before it is shaped into a well-formed record.
#[derive(Debug, Clone)]
pub enum RawOp {
    /// Write a value; becomes a create or an update.
    Write {
        /// Key written.
        key: EntryKey,
        /// Value written.
        value: EntryValue,
        /// Stamp of the write.
        stamp: Stamp,
    },
    /// Destroy a key.
    Destroy {
        /// Key destroyed.
        key: EntryKey,
    },
}

/// Strategy for generating raw mutations.
pub fn raw_op_strategy() -> impl Strategy<Value = RawOp> {
    prop_oneof![
        3 => (key_strategy(), entry_value_strategy(), stamp_strategy())
            .prop_map(|(key, value, stamp)| RawOp::Write { key, value, stamp }),
        1 => key_strategy().prop_map(|key| RawOp::Destroy { key }),
    ]
}

/// Shapes raw mutations into records a validating replay accepts.
///
/// A write to a live key becomes an update, any other write a create. A
/// destroy of a key that is already destroyed is dropped; a destroy of a
/// key never written is kept, since it is a valid no-op.
pub fn normalize(ops: Vec<RawOp>) -> Vec<OplogRecord> {
    let mut live: HashMap<EntryKey, bool> = HashMap::new();
    let mut records = Vec::with_capacity(ops.len());

    for op in ops {
        match op {
            RawOp::Write { key, value, stamp } => {
                let was_live = live.insert(key.clone(), true) == Some(true);
                records.push(if was_live {
                    OplogRecord::Update { key, value, stamp }
                } else {
                    OplogRecord::Create { key, value, stamp }
                });
            }
            RawOp::Destroy { key } => match live.get(&key) {
                Some(false) => {}
                Some(true) => {
                    live.insert(key.clone(), false);
                    records.push(OplogRecord::Destroy { key });
                }
                None => records.push(OplogRecord::Destroy { key }),
            },
        }
    }

    records
}

/// Strategy for generating a well-formed history of up to `max_oplogs`
/// oplogs with up to `max_ops_per_oplog` records each.
///
/// Oplog ids strictly increase, with random gaps.
pub fn oplog_history_strategy(
    max_oplogs: usize,
    max_ops_per_oplog: usize,
) -> impl Strategy<Value = OplogHistory> {
    prop::collection::vec(
        (
            1u64..5,
            prop::collection::vec(raw_op_strategy(), 0..=max_ops_per_oplog),
        ),
        0..=max_oplogs,
    )
    .prop_map(|segments| {
        let sizes: Vec<usize> = segments.iter().map(|(_, ops)| ops.len()).collect();
        let gaps: Vec<u64> = segments.iter().map(|(gap, _)| *gap).collect();
        let mut records = normalize(segments.into_iter().flat_map(|(_, ops)| ops).collect())
            .into_iter();

        // Normalizing can only drop records, so each segment keeps at most
        // its original size.
        let mut history = Vec::with_capacity(sizes.len());
        let mut id = 0u64;
        for (size, gap) in sizes.into_iter().zip(gaps) {
            id += gap;
            history.push((OplogId::new(id), records.by_ref().take(size).collect()));
        }
        history
    })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
