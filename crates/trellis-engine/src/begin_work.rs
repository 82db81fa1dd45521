//! Begin phase: render one fiber and reconcile its children.

use std::sync::Arc;

use tracing::{trace, warn};
use trellis_arena::{Fiber, FiberRef};
use trellis_core::{
    Component, EffectTag, ElementType, ExpirationTime, InstanceId, Node, Props, RenderContext,
    Value, ValueMap, WorkTag,
};

use crate::child_reconciler::ChildReconciler;
use crate::error::RenderError;
use crate::update_queue::{process_update_queue, ROOT_ELEMENT_KEY};
use crate::work_loop::RenderCx;

/// Do the render work for `wip`. Returns the first child to work on
/// next, or `None` when the fiber should be completed.
pub(crate) fn begin_work(
    cx: &mut RenderCx<'_>,
    current: Option<FiberRef>,
    wip: FiberRef,
) -> Result<Option<FiberRef>, RenderError> {
    let render = cx.session.expiration;

    if let Some(current) = current {
        let old_props = cx.arena.get(current)?.memoized_props.clone();
        let fiber = cx.arena.get(wip)?;
        let same_props = old_props.is_some_and(|p| p.ptr_eq(&fiber.pending_props));
        if same_props && !cx.session.context_changed && !fiber.expiration_time.covers(render) {
            return bailout_on_already_finished_work(cx, wip);
        }
    }

    let tag = {
        let fiber = cx.arena.get_mut(wip)?;
        fiber.expiration_time = ExpirationTime::NO_WORK;
        fiber.tag
    };
    match tag {
        WorkTag::IndeterminateComponent => mount_indeterminate_component(cx, wip),
        WorkTag::FunctionComponent => update_function_component(cx, current, wip),
        WorkTag::HostRoot => update_host_root(cx, current, wip),
        WorkTag::HostComponent => update_host_component(cx, current, wip),
        WorkTag::HostText => Ok(None),
        WorkTag::Fragment => {
            let children = cx.arena.get(wip)?.pending_props.children().clone();
            reconcile_children(cx, current, wip, &children)
        }
    }
}

// ── Bailout ─────────────────────────────────────────────────────

fn bailout_on_already_finished_work(
    cx: &mut RenderCx<'_>,
    wip: FiberRef,
) -> Result<Option<FiberRef>, RenderError> {
    cx.session.metrics.bailouts += 1;
    let child_expiration = cx.arena.get(wip)?.child_expiration_time;
    if !child_expiration.covers(cx.session.expiration) {
        trace!(fiber = %wip, "subtree has no work, skipped");
        return Ok(None);
    }
    clone_child_fibers(cx, wip)?;
    Ok(cx.arena.get(wip)?.child)
}

/// Replace `wip`'s shared current children with work-in-progress
/// clones carrying their existing props.
fn clone_child_fibers(cx: &mut RenderCx<'_>, wip: FiberRef) -> Result<(), RenderError> {
    let Some(mut current_child) = cx.arena.get(wip)?.child else {
        return Ok(());
    };
    let props = cx.arena.get(current_child)?.pending_props.clone();
    let mut new_child = cx.session.clone_fiber(cx.arena, current_child, props)?;
    cx.arena.get_mut(wip)?.child = Some(new_child);
    cx.arena.set_return(new_child, Some(wip))?;

    while let Some(next) = cx.arena.sibling_of(current_child)? {
        current_child = next;
        let props = cx.arena.get(current_child)?.pending_props.clone();
        let next_new = cx.session.clone_fiber(cx.arena, current_child, props)?;
        cx.arena.get_mut(new_child)?.sibling = Some(next_new);
        cx.arena.set_return(next_new, Some(wip))?;
        new_child = next_new;
    }
    cx.arena.get_mut(new_child)?.sibling = None;
    Ok(())
}

// ── Per-kind work ───────────────────────────────────────────────

fn mount_indeterminate_component(
    cx: &mut RenderCx<'_>,
    wip: FiberRef,
) -> Result<Option<FiberRef>, RenderError> {
    let (component, props) = {
        let fiber = cx.arena.get(wip)?;
        (component_of(fiber), fiber.pending_props.clone())
    };
    let Some(component) = component else {
        return reconcile_children(cx, None, wip, &Node::Empty);
    };
    let state = component.initial_state(&props);
    let children = render_component(cx, &component, &props, &state, wip.instance())?;
    {
        let fiber = cx.arena.get_mut(wip)?;
        fiber.tag = WorkTag::FunctionComponent;
        fiber.memoized_state = state;
        fiber.effect_tag.insert(EffectTag::PERFORMED_WORK);
    }
    reconcile_children(cx, None, wip, &children)
}

fn update_function_component(
    cx: &mut RenderCx<'_>,
    current: Option<FiberRef>,
    wip: FiberRef,
) -> Result<Option<FiberRef>, RenderError> {
    let (component, props) = {
        let fiber = cx.arena.get(wip)?;
        (component_of(fiber), fiber.pending_props.clone())
    };
    let Some(component) = component else {
        return reconcile_children(cx, current, wip, &Node::Empty);
    };

    let (state, force_update) =
        match process_update_queue(cx.arena, wip, &props, cx.session.expiration)? {
            Some(processed) => (processed.state, processed.force_update),
            None => (cx.arena.get(wip)?.memoized_state.clone(), false),
        };

    if let Some(current) = current {
        let fiber = cx.arena.get(current)?;
        let same_props = fiber.memoized_props.as_ref().is_some_and(|p| p.ptr_eq(&props));
        if same_props
            && !force_update
            && !cx.session.context_changed
            && fiber.memoized_state == state
        {
            return bailout_on_already_finished_work(cx, wip);
        }
    }

    let children = render_component(cx, &component, &props, &state, wip.instance())?;
    cx.arena.get_mut(wip)?.effect_tag.insert(EffectTag::PERFORMED_WORK);
    reconcile_children(cx, current, wip, &children)
}

fn update_host_root(
    cx: &mut RenderCx<'_>,
    current: Option<FiberRef>,
    wip: FiberRef,
) -> Result<Option<FiberRef>, RenderError> {
    let (props, previous) = {
        let fiber = cx.arena.get(wip)?;
        (fiber.pending_props.clone(), root_element(&fiber.memoized_state))
    };
    let state = match process_update_queue(cx.arena, wip, &props, cx.session.expiration)? {
        Some(processed) => processed.state,
        None => cx.arena.get(wip)?.memoized_state.clone(),
    };
    let next = root_element(&state).unwrap_or_default();
    if let Some(previous) = previous {
        if previous.ptr_eq(&next) && !cx.session.context_changed {
            return bailout_on_already_finished_work(cx, wip);
        }
    }
    reconcile_children(cx, current, wip, &next)
}

fn update_host_component(
    cx: &mut RenderCx<'_>,
    current: Option<FiberRef>,
    wip: FiberRef,
) -> Result<Option<FiberRef>, RenderError> {
    let (element_type, next_props) = {
        let fiber = cx.arena.get(wip)?;
        (host_type_of(fiber), fiber.pending_props.clone())
    };
    let previous_props = match current {
        Some(c) => cx.arena.get(c)?.memoized_props.clone(),
        None => None,
    };

    let mut children = next_props.children().clone();
    if cx.host.should_set_text_content(&element_type, &next_props) {
        // The host renders the text itself; no child fiber.
        children = Node::Empty;
    } else if let Some(previous) = &previous_props {
        if cx.host.should_set_text_content(&element_type, previous) {
            cx.arena.get_mut(wip)?.effect_tag.insert(EffectTag::CONTENT_RESET);
        }
    }

    mark_ref(cx, current, wip)?;
    reconcile_children(cx, current, wip, &children)
}

// ── Helpers ─────────────────────────────────────────────────────

fn reconcile_children(
    cx: &mut RenderCx<'_>,
    current: Option<FiberRef>,
    wip: FiberRef,
    children: &Node,
) -> Result<Option<FiberRef>, RenderError> {
    let child = match current {
        None => ChildReconciler::MOUNT.reconcile_child_fibers(cx, wip, None, children)?,
        Some(c) => {
            let current_child = cx.arena.get(c)?.child;
            ChildReconciler::UPDATE.reconcile_child_fibers(cx, wip, current_child, children)?
        }
    };
    cx.arena.get_mut(wip)?.child = child;
    Ok(child)
}

fn render_component(
    cx: &RenderCx<'_>,
    component: &Component,
    props: &Props,
    state: &ValueMap,
    instance: InstanceId,
) -> Result<Node, RenderError> {
    let render_cx = RenderContext::new(props, state, cx.session.context.as_ref(), instance);
    component.render(&render_cx).map_err(|source| {
        warn!(component = component.name(), %instance, error = %source, "component render failed");
        RenderError::Component {
            name: component.name().to_string(),
            instance,
            source,
        }
    })
}

/// Tag `wip` when its ref callback appeared, disappeared, or changed.
fn mark_ref(
    cx: &mut RenderCx<'_>,
    current: Option<FiberRef>,
    wip: FiberRef,
) -> Result<(), RenderError> {
    let new_ref = cx.arena.get(wip)?.ref_callback.clone();
    let changed = match current {
        None => new_ref.is_some(),
        Some(c) => match (&cx.arena.get(c)?.ref_callback, &new_ref) {
            (None, None) => false,
            (Some(old), Some(new)) => !Arc::ptr_eq(old, new),
            _ => true,
        },
    };
    if changed {
        cx.arena.get_mut(wip)?.effect_tag.insert(EffectTag::REF);
    }
    Ok(())
}

fn component_of(fiber: &Fiber) -> Option<Component> {
    match &fiber.element_type {
        Some(ElementType::Component(c)) => Some(c.clone()),
        _ => None,
    }
}

pub(crate) fn host_type_of(fiber: &Fiber) -> Arc<str> {
    match &fiber.element_type {
        Some(ElementType::Host(tag)) => tag.clone(),
        _ => Arc::from(""),
    }
}

fn root_element(state: &ValueMap) -> Option<Node> {
    state.get(ROOT_ELEMENT_KEY).and_then(Value::as_node).cloned()
}
