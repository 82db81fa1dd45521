//! Criterion micro-benchmarks for prioritized state updates and time
//! slicing.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use trellis_bench::{counter_grid, keyed_list, mounted, row_keys};
use trellis_core::{value_map, PriorityLevel, Update, Value};
use trellis_engine::RootOptions;
use trellis_test_utils::fixtures::counter;

const COUNTERS: usize = 500;

fn increment() -> Update {
    Update::reducer(|prev, _| {
        let n = prev.get("count").and_then(Value::as_int).unwrap_or(0);
        value_map([("count", n + 1)])
    })
}

/// Benchmark: one state update deep in a 500-counter tree, rendered to
/// commit. Everything but the target bails out.
fn bench_single_update(c: &mut Criterion) {
    let component = counter();
    let (mut rec, root) = mounted(counter_grid(&component, COUNTERS), RootOptions::LEGACY);
    let target = rec
        .current_tree(root)
        .unwrap()
        .find_key(&(COUNTERS / 2).to_string())
        .unwrap()
        .instance;
    c.bench_function("single_update_500", |b| {
        b.iter(|| {
            rec.enqueue_update(target, increment(), PriorityLevel::Normal).unwrap();
            black_box(rec.last_metrics().map(|m| m.bailouts));
        });
    });
}

/// Benchmark: mixed-priority updates across every counter, flushed by
/// priority in slices.
fn bench_mixed_priorities(c: &mut Criterion) {
    let component = counter();
    c.bench_function("mixed_priorities_500", |b| {
        b.iter_batched(
            || {
                let (rec, root) =
                    mounted(counter_grid(&component, COUNTERS), RootOptions::CONCURRENT);
                let targets: Vec<_> = rec
                    .current_tree(root)
                    .unwrap()
                    .nodes()
                    .iter()
                    .filter(|v| v.type_name == "Counter")
                    .map(|v| v.instance)
                    .collect();
                (rec, targets)
            },
            |(mut rec, targets)| {
                for (i, target) in targets.iter().enumerate() {
                    let priority = if i % 10 == 0 {
                        PriorityLevel::UserBlocking
                    } else {
                        PriorityLevel::Normal
                    };
                    rec.enqueue_update(*target, increment(), priority).unwrap();
                }
                rec.scheduler_mut().set_yield_budget(Some(64));
                while rec.has_pending_work() {
                    rec.perform_async_work().unwrap();
                    rec.scheduler_mut().set_yield_budget(Some(64));
                }
                black_box(rec.totals().commits);
            },
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark: a 1K-row render split into 64-unit slices.
fn bench_time_sliced_mount(c: &mut Criterion) {
    let keys = row_keys(1_000);
    c.bench_function("time_sliced_mount_1k", |b| {
        b.iter_batched(
            || mounted(keyed_list::<&str>(&[]), RootOptions::CONCURRENT),
            |(mut rec, root)| {
                rec.schedule_update(root, keyed_list(&keys), None).unwrap();
                while rec.has_pending_work() {
                    rec.scheduler_mut().set_yield_budget(Some(64));
                    rec.perform_async_work().unwrap();
                }
                black_box(rec.totals().commits);
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_single_update,
    bench_mixed_priorities,
    bench_time_sliced_mount,
);
criterion_main!(benches);
