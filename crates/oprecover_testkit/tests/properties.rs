//! Property tests for replay, validation and export.

use oprecover_core::{
    CoreError, EntryKey, ExportOverlay, NoopHooks, OplogId, OplogRecord, OplogRecordType,
    Recovery, RecoveryConfig, ValidatingOverlay,
};
use oprecover_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::HashMap;

fn recover(
    source: &oprecover_core::MemoryOplogSource,
) -> oprecover_core::CoreResult<oprecover_core::RecoveredRegion> {
    Recovery::new(RecoveryConfig::default()).run(source, &mut NoopHooks)
}

proptest! {
    #![proptest_config(PropTestConfig::default().to_proptest_config())]

    #[test]
    fn replay_matches_direct_application(
        history in oplog_history_strategy(6, 12),
        version in version_strategy(),
    ) {
        let source = memory_source("prop", version, &history);
        let region = recover(&source).unwrap();

        let model = ReferenceModel::replay_as(&history, version);
        prop_assert!(model.matches(&region.table));
        prop_assert_eq!(region.stats.live_entries, model.entries().len() as u64);
        prop_assert_eq!(region.last_oplog, history.last().map(|(id, _)| *id));
    }

    #[test]
    fn last_writer_wins_per_key(history in oplog_history_strategy(6, 12)) {
        let source = memory_source("lww", oprecover_codec::VersionTag::V2, &history);
        let region = recover(&source).unwrap();

        let mut last: HashMap<EntryKey, Option<&OplogRecord>> = HashMap::new();
        for (_, records) in &history {
            for record in records {
                let winner = record.entry().map(|_| record);
                last.insert(record.key().clone(), winner);
            }
        }

        for (key, winner) in last {
            match winner {
                Some(record) => {
                    let expected = record.entry();
                    prop_assert_eq!(region.table.get(&key), expected.as_ref())
                }
                None => prop_assert!(!region.table.contains_key(&key)),
            }
        }
    }

    #[test]
    fn generated_histories_validate(history in oplog_history_strategy(6, 12)) {
        let source = memory_source("valid", oprecover_codec::VersionTag::V2, &history);
        let mut overlay = ValidatingOverlay::new();
        let region = Recovery::new(RecoveryConfig::default())
            .run(&source, &mut overlay)
            .unwrap();

        let report = overlay.into_report();
        prop_assert_eq!(report.oplogs, history.len() as u64);
        prop_assert_eq!(report.live_keys, region.table.len() as u64);
    }

    #[test]
    fn export_batches_hold_latest_mutations_per_oplog(
        history in oplog_history_strategy(6, 12),
        version in version_strategy(),
    ) {
        let source = memory_source("export", version, &history);
        let mut overlay = ExportOverlay::new(RecordingWriter::new());
        Recovery::new(RecoveryConfig::default())
            .run(&source, &mut overlay)
            .unwrap();

        prop_assert!(overlay.batch().is_empty());
        let expected = ReferenceModel::expected_batches(&history, version);
        prop_assert_eq!(&overlay.writer().batches, &expected);
    }

    #[test]
    fn writer_failure_halts_replay(
        history in oplog_history_strategy(6, 8).prop_filter("need an oplog", |h| !h.is_empty()),
        pick in any::<prop::sample::Index>(),
    ) {
        let fail_index = pick.index(history.len());
        let fail_at = history[fail_index].0;
        let source = memory_source("fail", oprecover_codec::VersionTag::V2, &history);

        let mut overlay = ExportOverlay::new(FailingWriter::at(fail_at));
        let err = Recovery::new(RecoveryConfig::default())
            .run(&source, &mut overlay)
            .unwrap_err();

        prop_assert!(err.is_disk_access());
        let is_sink = matches!(err.root_cause(), CoreError::ExportSink { .. });
        prop_assert!(is_sink);
        prop_assert_eq!(err.oplog_id(), Some(fail_at));

        let offered: Vec<OplogId> = history[..=fail_index].iter().map(|(id, _)| *id).collect();
        prop_assert_eq!(&overlay.writer().calls, &offered);
    }

    #[test]
    fn null_value_always_corrupts(
        history in oplog_history_strategy(4, 8),
        key in key_strategy(),
        update in any::<bool>(),
        version in version_strategy(),
    ) {
        let mut source = memory_source("null", version, &history);
        let id = OplogId::new(history.last().map_or(1, |(id, _)| id.as_u64() + 1));
        let record_type = if update { OplogRecordType::Update } else { OplogRecordType::Create };
        source.add_raw(id, null_value_segment(id, version, record_type, &key));

        let err = recover(&source).unwrap_err();
        prop_assert!(err.is_disk_access());
        prop_assert!(err.is_corruption());
        prop_assert_eq!(err.key(), Some(&key));
        prop_assert_eq!(err.oplog_id(), Some(id));
    }
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn disk_store_matches_memory_source(
        history in oplog_history_strategy(4, 8),
        version in version_strategy(),
    ) {
        let store = TestStore::new("prop-store");
        store.write_history(version, &history);

        let from_disk = Recovery::new(RecoveryConfig::default())
            .run(&store.open(), &mut NoopHooks)
            .unwrap();
        let from_memory = recover(&memory_source("prop-store", version, &history)).unwrap();

        prop_assert_eq!(from_disk.table, from_memory.table);
        prop_assert_eq!(from_disk.stats, from_memory.stats);
    }
}

#[test]
fn scenario_export() {
    let history = scenario_oplogs();
    let source = memory_source("scenario", oprecover_codec::VersionTag::V2, &history);
    let mut overlay = ExportOverlay::new(RecordingWriter::new());
    let region = Recovery::new(RecoveryConfig::default())
        .run(&source, &mut overlay)
        .unwrap();

    assert_eq!(region.table.len(), 1);
    let writer = overlay.into_writer();
    assert_eq!(writer.oplog_ids(), vec![OplogId::new(1), OplogId::new(2)]);

    let first: Vec<_> = writer.batches[0].1.keys().cloned().collect();
    assert_eq!(first, vec![EntryKey::from("k1"), EntryKey::from("k2")]);
    let second = &writer.batches[1].1;
    assert_eq!(second.len(), 1);
    assert_eq!(
        second[&EntryKey::from("k1")].value.as_inline().unwrap().as_ref(),
        b"c"
    );
}

#[test]
fn null_update_on_disk_store() {
    let store = TestStore::new("null-disk");
    store.write_history(oprecover_codec::VersionTag::V2, &scenario_oplogs());
    let key = EntryKey::from("k1");
    store.write_raw_oplog(
        OplogId::new(3),
        &null_value_segment(
            OplogId::new(3),
            oprecover_codec::VersionTag::V2,
            OplogRecordType::Update,
            &key,
        ),
    );

    let err = Recovery::new(RecoveryConfig::default())
        .run(&store.open(), &mut NoopHooks)
        .unwrap_err();
    assert!(err.is_corruption());
    assert_eq!(err.key(), Some(&key));
    assert!(err.to_string().contains("null-disk"));
}
