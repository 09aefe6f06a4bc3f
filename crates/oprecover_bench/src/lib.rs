//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use oprecover_codec::VersionTag;
use oprecover_core::{CoreResult, MemoryOplogSource, OplogId, OplogRecord, Stamp};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generates value bytes of the given size, reproducible per seed.
pub fn value_data(seed: u64, size: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut buf = vec![0u8; size];
    rng.fill(&mut buf[..]);
    buf
}

/// Generates one oplog's records over a keyspace of `keys` keys.
///
/// The first oplog creates every key it touches. Later oplogs update, and
/// destroy one key in ten, shifting which keys per oplog so a key is
/// revived by an update before it is destroyed again.
pub fn oplog_records(
    oplog: u64,
    records: usize,
    keys: usize,
    value_size: usize,
) -> Vec<OplogRecord> {
    (0..records)
        .map(|i| {
            let n = i % keys;
            let key = format!("key-{n:08}");
            let stamp = Stamp::new(oplog as u32, oplog * records as u64 + i as u64);
            if oplog == 1 {
                OplogRecord::create(key, value_data(n as u64, value_size), stamp)
            } else if (n as u64 + oplog) % 10 == 0 {
                OplogRecord::destroy(key)
            } else {
                OplogRecord::update(key, value_data(n as u64 ^ oplog, value_size), stamp)
            }
        })
        .collect()
}

/// Builds an in-memory source of `oplogs` oplogs.
///
/// # Errors
///
/// Returns an error if a record cannot be encoded under `version`.
pub fn build_source(
    oplogs: u64,
    records_per_oplog: usize,
    value_size: usize,
    version: VersionTag,
) -> CoreResult<MemoryOplogSource> {
    let mut source = MemoryOplogSource::new("bench");
    for id in 1..=oplogs {
        let records = oplog_records(id, records_per_oplog, records_per_oplog, value_size);
        source.add_oplog(OplogId::new(id), version, &records)?;
    }
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oprecover_core::{Recovery, RecoveryConfig, ValidatingOverlay};

    #[test]
    fn value_data_is_seeded() {
        assert_eq!(value_data(7, 64), value_data(7, 64));
        assert_ne!(value_data(7, 64), value_data(8, 64));
        assert_eq!(value_data(1, 1000).len(), 1000);
        assert!(value_data(1, 0).is_empty());
    }

    #[test]
    fn generated_history_validates() {
        let source = build_source(12, 50, 8, VersionTag::CURRENT).unwrap();
        let mut overlay = ValidatingOverlay::new();
        let region = Recovery::new(RecoveryConfig::default())
            .run(&source, &mut overlay)
            .unwrap();

        assert_eq!(region.stats.oplogs, 12);
        assert_eq!(overlay.report().creates, 50);
        assert!(overlay.report().destroys > 0);
    }
}
