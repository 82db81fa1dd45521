//! Shared harness for the reconciler scenario tests.

#![allow(dead_code)]

use trellis_core::{HostHandle, Node, RootId};
use trellis_engine::{
    EffectSummary, Reconciler, ReconcilerConfig, RootOptions, TreeSnapshot, WorkStatus,
};
use trellis_test_utils::fixtures::init_test_tracing;
use trellis_test_utils::{ManualScheduler, RecordingHost};

pub type TestReconciler = Reconciler<RecordingHost, ManualScheduler>;

/// One reconciler with one root and its container.
pub struct Harness {
    pub rec: TestReconciler,
    pub root: RootId,
    pub container: HostHandle,
}

impl Harness {
    pub fn legacy() -> Self {
        Self::with(RecordingHost::new(), ReconcilerConfig::default(), RootOptions::LEGACY)
    }

    pub fn concurrent() -> Self {
        Self::with(RecordingHost::new(), ReconcilerConfig::default(), RootOptions::CONCURRENT)
    }

    pub fn with(mut host: RecordingHost, config: ReconcilerConfig, options: RootOptions) -> Self {
        init_test_tracing();
        let container = host.create_container();
        let mut rec = Reconciler::new(host, ManualScheduler::new(), config).unwrap();
        let root = rec.create_root(container, options).unwrap();
        Self {
            rec,
            root,
            container,
        }
    }

    /// Schedule `node` at normal priority. Legacy roots commit before
    /// this returns.
    pub fn render(&mut self, node: impl Into<Node>) {
        self.rec.schedule_update(self.root, node, None).unwrap();
    }

    /// Schedule `node` and render it without committing.
    pub fn prepare(&mut self, node: impl Into<Node>) -> EffectSummary {
        self.rec.schedule_update(self.root, node, None).unwrap();
        self.rec
            .prepare_root(self.root)
            .unwrap()
            .expect("root has pending work")
    }

    /// Commit the prepared tree.
    pub fn commit(&mut self) {
        assert!(self.rec.commit_root(self.root).unwrap(), "nothing to commit");
    }

    /// Schedule, render, and commit `node` on a concurrent root.
    pub fn mount(&mut self, node: impl Into<Node>) {
        self.prepare(node);
        self.commit();
    }

    /// Run async work until nothing is scheduled.
    pub fn flush(&mut self) {
        for _ in 0..64 {
            if self.rec.perform_async_work().unwrap() == WorkStatus::Idle {
                return;
            }
        }
        panic!("work did not settle");
    }

    pub fn markup(&self) -> String {
        self.rec.host().markup(self.container)
    }

    pub fn tree(&self) -> TreeSnapshot {
        self.rec.current_tree(self.root).unwrap()
    }
}
