//! Replay benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use oprecover_bench::build_source;
use oprecover_codec::VersionTag;
use oprecover_core::{
    ExportBatch, ExportOverlay, ExportWriter, NoopHooks, OplogId, Recovery, RecoveryConfig,
    ValidatingOverlay,
};
use std::io;

/// Export sink that only counts entries.
struct CountingWriter(u64);

impl ExportWriter for CountingWriter {
    fn write_batch(&mut self, _oplog_id: OplogId, batch: &ExportBatch) -> io::Result<()> {
        self.0 += batch.len() as u64;
        Ok(())
    }
}

/// Benchmark a plain replay at increasing sizes.
fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");

    for records in [100usize, 1_000, 10_000] {
        let source = build_source(4, records, 64, VersionTag::CURRENT).unwrap();
        group.throughput(Throughput::Elements(4 * records as u64));
        group.bench_with_input(BenchmarkId::from_parameter(records), &source, |b, source| {
            b.iter(|| {
                let region = Recovery::new(RecoveryConfig::default())
                    .run(black_box(source), &mut NoopHooks)
                    .unwrap();
                black_box(region);
            });
        });
    }

    group.finish();
}

/// Benchmark the overlays against a plain replay.
fn bench_overlays(c: &mut Criterion) {
    let mut group = c.benchmark_group("overlays");
    let source = build_source(8, 2_000, 64, VersionTag::CURRENT).unwrap();
    group.throughput(Throughput::Elements(8 * 2_000));

    group.bench_function("noop", |b| {
        b.iter(|| {
            Recovery::new(RecoveryConfig::default())
                .run(&source, &mut NoopHooks)
                .unwrap()
        });
    });

    group.bench_function("validate", |b| {
        b.iter(|| {
            let mut overlay = ValidatingOverlay::new();
            Recovery::new(RecoveryConfig::default())
                .run(&source, &mut overlay)
                .unwrap();
            black_box(overlay.into_report());
        });
    });

    group.bench_function("export", |b| {
        b.iter(|| {
            let mut overlay = ExportOverlay::new(CountingWriter(0));
            Recovery::new(RecoveryConfig::default())
                .run(&source, &mut overlay)
                .unwrap();
            black_box(overlay.into_writer().0);
        });
    });

    group.finish();
}

/// Benchmark checksum verification cost.
fn bench_checksums(c: &mut Criterion) {
    let mut group = c.benchmark_group("checksums");
    let source = build_source(4, 5_000, 1024, VersionTag::CURRENT).unwrap();

    for verify in [true, false] {
        let config = RecoveryConfig::new().verify_checksums(verify);
        group.bench_with_input(BenchmarkId::from_parameter(verify), &config, |b, config| {
            b.iter(|| Recovery::new(*config).run(&source, &mut NoopHooks).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_replay, bench_overlays, bench_checksums);
criterion_main!(benches);
