//! Fiber-level update queue operations.
//!
//! The queue itself lives in `trellis_core::update`. This module wires
//! it to fibers: enqueueing writes to both buffers of an instance, and
//! processing writes only to the work-in-progress buffer.

use std::sync::Arc;

use trellis_arena::{ArenaError, FiberArena, FiberRef};
use trellis_core::{EffectTag, ExpirationTime, InstanceId, ProcessedQueue, Props, Update, UpdateQueue};

/// State key under which a root keeps the element it displays.
pub(crate) const ROOT_ELEMENT_KEY: &str = "element";

/// Append `update` to the queue of every buffer of `instance`.
///
/// A buffer with no queue gets one based on its memoized state. Buffers
/// that share a queue allocation are split first, so each copy receives
/// the update exactly once.
pub(crate) fn enqueue_update(
    arena: &mut FiberArena,
    instance: InstanceId,
    update: Update,
) -> Result<(), ArenaError> {
    let update = Arc::new(update);
    arena.for_each_buffer(instance, |fiber| {
        let base = fiber.memoized_state.clone();
        let queue = fiber
            .update_queue
            .get_or_insert_with(|| Arc::new(UpdateQueue::new(base)));
        Arc::make_mut(queue).push(update.clone());
    })
}

/// Process the queue of the work-in-progress fiber `wip` at `render`.
///
/// Writes the resulting state and remaining expiration onto the fiber
/// and tags it with `Callback` / `DidCapture` as needed. Returns `None`
/// when the fiber has no queue.
pub(crate) fn process_update_queue(
    arena: &mut FiberArena,
    wip: FiberRef,
    props: &Props,
    render: ExpirationTime,
) -> Result<Option<ProcessedQueue>, ArenaError> {
    let fiber = arena.get_mut(wip)?;
    let Some(queue) = fiber.update_queue.as_mut() else {
        return Ok(None);
    };
    let processed = Arc::make_mut(queue).process(props, render);
    fiber.expiration_time = processed.remaining;
    fiber.memoized_state = processed.state.clone();
    if processed.has_callbacks {
        fiber.effect_tag.insert(EffectTag::CALLBACK);
    }
    if processed.captured {
        fiber.effect_tag.insert(EffectTag::DID_CAPTURE);
    }
    Ok(Some(processed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_arena::{ArenaConfig, Fiber};
    use trellis_core::{value_map, HostHandle, RootId, Value};

    fn setup() -> (FiberArena, FiberRef, FiberRef) {
        let mut arena = FiberArena::new(ArenaConfig::default()).unwrap();
        let current = arena
            .allocate(Fiber::host_root(RootId(0), HostHandle(0)))
            .unwrap();
        let wip = arena.create_work_in_progress(current, Props::empty()).unwrap();
        (arena, current, wip)
    }

    fn merge(n: i64, e: u32) -> Update {
        let mut u = Update::merge(value_map([("n", n)]));
        u.expiration_time = ExpirationTime::from_raw(e);
        u
    }

    #[test]
    fn enqueue_reaches_both_buffers_once() {
        let (mut arena, current, wip) = setup();
        enqueue_update(&mut arena, current.instance(), merge(1, 100)).unwrap();
        for r in [current, wip] {
            let q = arena.get(r).unwrap().update_queue.clone().unwrap();
            assert_eq!(q.len(), 1);
        }
    }

    #[test]
    fn processing_leaves_current_queue_intact() {
        let (mut arena, current, wip) = setup();
        enqueue_update(&mut arena, current.instance(), merge(1, 100)).unwrap();
        let out = process_update_queue(&mut arena, wip, &Props::empty(), ExpirationTime::from_raw(100))
            .unwrap()
            .unwrap();
        assert_eq!(out.state.get("n"), Some(&Value::Int(1)));
        assert!(arena.get(wip).unwrap().update_queue.as_ref().unwrap().is_empty());
        assert_eq!(arena.get(current).unwrap().update_queue.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn higher_priority_pass_leaves_lower_update_queued() {
        let (mut arena, current, wip) = setup();
        enqueue_update(&mut arena, current.instance(), merge(1, 50)).unwrap();
        enqueue_update(&mut arena, current.instance(), merge(2, 500)).unwrap();
        let out = process_update_queue(&mut arena, wip, &Props::empty(), ExpirationTime::from_raw(500))
            .unwrap()
            .unwrap();
        assert_eq!(out.state.get("n"), Some(&Value::Int(2)));
        assert_eq!(out.remaining, ExpirationTime::from_raw(50));
        let f = arena.get(wip).unwrap();
        assert_eq!(f.expiration_time, ExpirationTime::from_raw(50));
        assert_eq!(f.update_queue.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn callbacks_tag_the_fiber() {
        let (mut arena, current, wip) = setup();
        let update = merge(1, 100).with_callback(|| {});
        enqueue_update(&mut arena, current.instance(), update).unwrap();
        process_update_queue(&mut arena, wip, &Props::empty(), ExpirationTime::from_raw(100)).unwrap();
        assert!(arena.get(wip).unwrap().effect_tag.contains(EffectTag::CALLBACK));
    }
}
