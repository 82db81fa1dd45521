//! Benchmark profiles and utilities for the Trellis reconciler.
//!
//! - [`keyed_list`]: a `<ul>` of `n` keyed rows
//! - [`shuffled_keys`]: a deterministic permutation of row keys via seed
//! - [`counter_grid`]: `n` keyed stateful counters under one `<div>`
//! - [`mounted`]: a reconciler with one root already displaying a tree

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use trellis_core::{Component, Element, Node, RootId};
use trellis_engine::{Reconciler, ReconcilerConfig, RootOptions};
use trellis_test_utils::{ManualScheduler, RecordingHost};

/// The reconciler type every benchmark drives.
pub type BenchReconciler = Reconciler<RecordingHost, ManualScheduler>;

/// Row keys `"0"..n`, in order.
pub fn row_keys(n: usize) -> Vec<String> {
    (0..n).map(|i| i.to_string()).collect()
}

/// `<ul>` with one `<li key={k}>{k}</li>` per key.
pub fn keyed_list<S: AsRef<str>>(keys: &[S]) -> Node {
    Element::host("ul")
        .children(keys.iter().map(|k| {
            let k = k.as_ref();
            Element::host("li").key(k).text(k)
        }))
        .into()
}

/// Deterministic permutation of [`row_keys`].
///
/// Fisher-Yates driven by a 64-bit LCG seeded with `seed`.
pub fn shuffled_keys(n: usize, seed: u64) -> Vec<String> {
    let mut keys = row_keys(n);
    let mut state = seed;
    for i in (1..keys.len()).rev() {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let j = ((state >> 33) % (i as u64 + 1)) as usize;
        keys.swap(i, j);
    }
    keys
}

/// `n` keyed instances of `component` under a `<div>`.
pub fn counter_grid(component: &Component, n: usize) -> Node {
    Element::host("div")
        .children((0..n).map(|i| component.element().key(i)))
        .into()
}

/// A reconciler with one root that has committed `tree`.
pub fn mounted(tree: Node, options: RootOptions) -> (BenchReconciler, RootId) {
    let mut host = RecordingHost::new();
    let container = host.create_container();
    let config = ReconcilerConfig::default();
    let mut rec = match Reconciler::new(host, ManualScheduler::new(), config) {
        Ok(rec) => rec,
        Err(e) => panic!("default config rejected: {e}"),
    };
    let root = rec
        .create_root(container, options)
        .unwrap_or_else(|e| panic!("create_root: {e}"));
    rec.schedule_update(root, tree, None)
        .unwrap_or_else(|e| panic!("initial render: {e}"));
    if options.concurrent {
        while rec.has_pending_work() {
            rec.perform_async_work()
                .unwrap_or_else(|e| panic!("initial render: {e}"));
        }
    }
    rec.host_mut().clear_ops();
    (rec, root)
}
