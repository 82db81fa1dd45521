//! Criterion micro-benchmarks for keyed list reconciliation.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use trellis_bench::{keyed_list, mounted, row_keys, shuffled_keys};
use trellis_engine::RootOptions;

const ROWS: usize = 1_000;

/// Benchmark: render and commit a fresh 1K-row list.
fn bench_mount_1k(c: &mut Criterion) {
    let keys = row_keys(ROWS);
    c.bench_function("mount_1k", |b| {
        b.iter_batched(
            || mounted(keyed_list::<&str>(&[]), RootOptions::LEGACY),
            |(mut rec, root)| {
                rec.schedule_update(root, keyed_list(&keys), None).unwrap();
                black_box(rec.live_instances());
            },
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark: re-render an unchanged 1K-row list.
fn bench_identical_1k(c: &mut Criterion) {
    let keys = row_keys(ROWS);
    let (mut rec, root) = mounted(keyed_list(&keys), RootOptions::LEGACY);
    c.bench_function("identical_1k", |b| {
        b.iter(|| {
            rec.schedule_update(root, keyed_list(&keys), None).unwrap();
            black_box(rec.last_metrics().map(|m| m.updates));
        });
    });
}

/// Benchmark: reverse a 1K-row list, which moves all but one row.
fn bench_reverse_1k(c: &mut Criterion) {
    let forward = row_keys(ROWS);
    let mut backward = forward.clone();
    backward.reverse();
    c.bench_function("reverse_1k", |b| {
        b.iter_batched(
            || mounted(keyed_list(&forward), RootOptions::LEGACY),
            |(mut rec, root)| {
                rec.schedule_update(root, keyed_list(&backward), None).unwrap();
                black_box(rec.last_metrics().map(|m| m.placements));
            },
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark: apply a random permutation to a 1K-row list.
fn bench_shuffle_1k(c: &mut Criterion) {
    let forward = row_keys(ROWS);
    let shuffled = shuffled_keys(ROWS, 42);
    c.bench_function("shuffle_1k", |b| {
        b.iter_batched(
            || mounted(keyed_list(&forward), RootOptions::LEGACY),
            |(mut rec, root)| {
                rec.schedule_update(root, keyed_list(&shuffled), None).unwrap();
                black_box(rec.last_metrics().map(|m| m.placements));
            },
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark: drop every other row.
fn bench_remove_half_1k(c: &mut Criterion) {
    let forward = row_keys(ROWS);
    let halved: Vec<_> = forward.iter().step_by(2).cloned().collect();
    c.bench_function("remove_half_1k", |b| {
        b.iter_batched(
            || mounted(keyed_list(&forward), RootOptions::LEGACY),
            |(mut rec, root)| {
                rec.schedule_update(root, keyed_list(&halved), None).unwrap();
                black_box(rec.last_metrics().map(|m| m.deletions));
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_mount_1k,
    bench_identical_1k,
    bench_reverse_1k,
    bench_shuffle_1k,
    bench_remove_half_1k,
);
criterion_main!(benches);
