//! Integration test: priorities, time slicing, interruption, batching,
//! and the cross-thread inbox.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::Harness;
use trellis_core::{
    value_map, Callback, ExpirationTime, InstanceId, PriorityLevel, RootId, Update,
};
use trellis_engine::{ReconcileError, ReconcilerConfig, RootOptions, ScheduleError, WorkStatus};
use trellis_test_utils::fixtures::{counter, list};
use trellis_test_utils::RecordingHost;

fn counter_instance(h: &Harness) -> InstanceId {
    h.tree().find_type("Counter").expect("counter mounted").instance
}

#[test]
fn urgent_pass_leaves_less_urgent_update_queued() {
    let mut h = Harness::concurrent();
    h.mount(counter().element());
    let id = counter_instance(&h);

    let low = h
        .rec
        .enqueue_update(id, Update::merge(value_map([("low", 1)])), PriorityLevel::Normal)
        .unwrap();
    let high = h
        .rec
        .enqueue_update(id, Update::merge(value_map([("high", 1)])), PriorityLevel::UserBlocking)
        .unwrap();
    assert!(high > low);
    assert_eq!(h.rec.next_scheduled(), Some((h.root, high)));

    h.rec.prepare_root(h.root).unwrap().unwrap();
    let finished = h.rec.finished_tree(h.root).unwrap().unwrap();
    let state = &finished.find_type("Counter").unwrap().state;
    assert!(state.contains_key("high"));
    assert!(!state.contains_key("low"));

    h.commit();
    assert_eq!(h.rec.next_scheduled(), Some((h.root, low)));

    h.flush();
    let state = h.tree().find_type("Counter").unwrap().state.clone();
    assert_eq!(state, value_map([("count", 0), ("low", 1), ("high", 1)]));
    assert!(!h.rec.has_pending_work());
}

#[test]
fn state_update_rerenders_only_the_component() {
    let mut h = Harness::legacy();
    h.render(counter().element().attr("start", 41));
    assert_eq!(h.markup(), "<span>41</span>");
    let id = counter_instance(&h);

    h.rec
        .enqueue_update(
            id,
            Update::reducer(|prev, _| {
                let n = prev.get("count").and_then(|v| v.as_int()).unwrap_or(0);
                value_map([("count", n + 1)])
            }),
            PriorityLevel::Normal,
        )
        .unwrap();
    assert_eq!(h.markup(), "<span>42</span>");
    assert_eq!(counter_instance(&h), id);
    let metrics = h.rec.last_metrics().unwrap();
    assert_eq!(metrics.fibers_created, 0);
    assert!(metrics.bailouts >= 1);
}

#[test]
fn render_yields_and_resumes_where_it_stopped() {
    let mut h = Harness::concurrent();
    h.rec.scheduler_mut().set_yield_budget(Some(2));
    h.rec.schedule_update(h.root, list(&["a", "b", "c"]), None).unwrap();
    assert_eq!(h.rec.scheduler().tasks().len(), 1);

    let status = h.rec.perform_async_work().unwrap();
    assert!(matches!(status, WorkStatus::Pending(_)));
    assert!(h.rec.is_rendering());
    assert!(h.rec.host().ops().is_empty());
    assert_eq!(h.markup(), "");

    h.rec.scheduler_mut().set_yield_budget(None);
    assert_eq!(h.rec.perform_async_work().unwrap(), WorkStatus::Idle);
    assert!(!h.rec.is_rendering());
    assert_eq!(h.markup(), "<ul><li>a</li><li>b</li><li>c</li></ul>");

    let metrics = h.rec.last_metrics().unwrap();
    assert_eq!(metrics.yields, 1);
    assert_eq!(metrics.units_of_work, 8);
    assert_eq!(h.rec.totals().restarts, 0);
}

#[test]
fn expired_work_ignores_yield_requests() {
    let mut h = Harness::concurrent();
    h.rec.scheduler_mut().set_yield_budget(Some(0));
    h.rec.schedule_update(h.root, list(&["a"]), None).unwrap();

    h.rec.scheduler_mut().advance(10_000);
    assert_eq!(h.rec.perform_async_work().unwrap(), WorkStatus::Idle);
    assert_eq!(h.markup(), "<ul><li>a</li></ul>");
    assert_eq!(h.rec.last_metrics().unwrap().yields, 0);
}

#[test]
fn urgent_update_interrupts_and_restarts() {
    let mut h = Harness::concurrent();
    h.mount(list(&["a"]));

    h.rec.scheduler_mut().set_yield_budget(Some(2));
    h.rec.schedule_update(h.root, list(&["a", "b"]), None).unwrap();
    h.rec.perform_async_work().unwrap();
    assert!(h.rec.is_rendering());

    h.rec
        .schedule_update_with_priority(h.root, list(&["x"]), PriorityLevel::UserBlocking, None)
        .unwrap();
    assert!(!h.rec.is_rendering());
    assert_eq!(h.rec.totals().restarts, 1);

    h.rec.scheduler_mut().set_yield_budget(None);
    h.flush();
    assert_eq!(h.markup(), "<ul><li>x</li></ul>");
    assert_eq!(h.rec.live_instances(), h.tree().len());
}

#[test]
fn equal_or_lower_priority_update_does_not_interrupt_the_render() {
    let mut h = Harness::concurrent();
    h.mount(list(&["a"]));

    h.rec.scheduler_mut().set_yield_budget(Some(2));
    h.rec.schedule_update(h.root, list(&["a", "b"]), None).unwrap();
    h.rec.perform_async_work().unwrap();
    assert!(h.rec.is_rendering());

    h.rec.schedule_update(h.root, list(&["c"]), None).unwrap();
    h.rec
        .schedule_update_with_priority(h.root, list(&["d"]), PriorityLevel::Low, None)
        .unwrap();
    assert!(h.rec.is_rendering());
    assert_eq!(h.rec.totals().restarts, 0);

    h.rec.scheduler_mut().set_yield_budget(None);
    h.flush();
    assert_eq!(h.markup(), "<ul><li>d</li></ul>");
    assert_eq!(h.rec.totals().restarts, 0);
    assert_eq!(h.rec.live_instances(), h.tree().len());
}

#[test]
fn less_urgent_callback_is_not_requested_twice() {
    let mut h = Harness::concurrent();
    h.rec
        .schedule_update_with_priority(h.root, list(&["a"]), PriorityLevel::UserBlocking, None)
        .unwrap();
    h.rec.schedule_update(h.root, list(&["b"]), None).unwrap();
    assert_eq!(h.rec.scheduler().tasks().len(), 1);
    assert_eq!(h.rec.scheduler().tasks()[0].priority, PriorityLevel::UserBlocking);
}

#[test]
fn immediate_priority_commits_before_returning() {
    let mut h = Harness::concurrent();
    let exp = h
        .rec
        .schedule_update_with_priority(h.root, list(&["a"]), PriorityLevel::Immediate, None)
        .unwrap();
    assert_eq!(exp, ExpirationTime::SYNC);
    assert_eq!(h.markup(), "<ul><li>a</li></ul>");
}

#[test]
fn batched_updates_commit_once() {
    let mut h = Harness::legacy();
    let root = h.root;
    let before = h.rec.totals().commits;
    h.rec
        .batched_updates(|r| {
            r.schedule_update(root, list(&["a"]), None).unwrap();
            r.schedule_update(root, list(&["a", "b"]), None).unwrap();
        })
        .unwrap();
    assert_eq!(h.rec.totals().commits, before + 1);
    assert_eq!(h.markup(), "<ul><li>a</li><li>b</li></ul>");
}

#[test]
fn commit_callback_fires_once() {
    let mut h = Harness::legacy();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let callback: Callback = Arc::new(move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    h.rec.schedule_update(h.root, list(&["a"]), Some(callback)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    h.render(list(&["b"]));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn inbox_updates_from_other_threads_are_applied() {
    let mut h = Harness::legacy();
    let sender = h.rec.update_sender();
    let root = h.root;
    std::thread::spawn(move || {
        sender
            .schedule_update(root, list(&["a", "b"]), PriorityLevel::Normal)
            .unwrap();
        sender
            .schedule_update(RootId(99), list(&["z"]), PriorityLevel::Normal)
            .unwrap();
    })
    .join()
    .unwrap();

    assert_eq!(h.markup(), "");
    h.rec.perform_sync_work().unwrap();
    assert_eq!(h.markup(), "<ul><li>a</li><li>b</li></ul>");
    assert_eq!(h.rec.totals().inbox_messages, 1);
}

#[test]
fn rejected_inbox_message_does_not_drop_the_rest_of_the_batch() {
    let mut h = Harness::legacy();
    h.render(list(&["a"]));
    let text = h.tree().find_type("#text").unwrap().instance;

    let sender = h.rec.update_sender();
    sender
        .enqueue(text, Update::force(), PriorityLevel::Normal)
        .unwrap();
    sender
        .schedule_update(h.root, list(&["b"]), PriorityLevel::Normal)
        .unwrap();

    h.rec.perform_sync_work().unwrap();
    assert_eq!(h.markup(), "<ul><li>b</li></ul>");
    assert_eq!(h.rec.totals().inbox_messages, 1);
    assert!(!h.rec.has_pending_work());
}

/// A commit callback that schedules itself again.
fn bounce(sender: trellis_engine::UpdateSender, instance: InstanceId) -> Callback {
    Arc::new(move || {
        let mut update = Update::force();
        update.callback = Some(bounce(sender.clone(), instance));
        let _ = sender.enqueue(instance, update, PriorityLevel::Immediate);
    })
}

#[test]
fn self_scheduling_callback_hits_the_nested_update_limit() {
    let config = ReconcilerConfig {
        max_nested_updates: 5,
        ..ReconcilerConfig::default()
    };
    let mut h = Harness::with(RecordingHost::new(), config, RootOptions::LEGACY);
    h.render(list(&["a"]));
    let root_instance = h.tree().nodes()[0].instance;

    let sender = h.rec.update_sender();
    let mut update = Update::force();
    update.callback = Some(bounce(sender.clone(), root_instance));
    sender
        .enqueue(root_instance, update, PriorityLevel::Immediate)
        .unwrap();

    let before = h.rec.totals().commits;
    match h.rec.perform_sync_work() {
        Err(ReconcileError::Schedule(ScheduleError::NestedUpdateLimit { limit: 5 })) => {}
        other => panic!("expected NestedUpdateLimit, got {other:?}"),
    }
    assert_eq!(h.rec.totals().commits, before + 7);
    assert!(!h.rec.has_pending_work());
    assert_eq!(h.markup(), "<ul><li>a</li></ul>");
}

#[test]
fn updates_to_text_fibers_are_rejected() {
    let mut h = Harness::legacy();
    h.render(list(&["a"]));
    let text = h.tree().find_type("#text").unwrap().instance;
    match h.rec.enqueue_update(text, Update::force(), PriorityLevel::Normal) {
        Err(ReconcileError::Schedule(ScheduleError::NotStateful { .. })) => {}
        other => panic!("expected NotStateful, got {other:?}"),
    }
}

#[test]
fn updates_to_freed_instances_are_stale() {
    let mut h = Harness::legacy();
    h.render(list(&["a", "b"]));
    let b = h.tree().find_key("b").unwrap().instance;
    h.render(list(&["a"]));
    match h.rec.enqueue_update(b, Update::force(), PriorityLevel::Normal) {
        Err(ReconcileError::Schedule(ScheduleError::StaleInstance { instance })) => {
            assert_eq!(instance, b)
        }
        other => panic!("expected StaleInstance, got {other:?}"),
    }
}
