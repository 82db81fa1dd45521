//! Complete phase: build or diff host instances, then climb.

use tracing::trace;
use trellis_arena::{FiberRef, StateNode};
use trellis_core::{EffectTag, ExpirationTime, HostHandle, WorkTag};

use crate::begin_work::host_type_of;
use crate::error::RenderError;
use crate::session::Effect;
use crate::work_loop::RenderCx;

/// Complete `unit` and every ancestor whose children are all done.
///
/// Returns the next sibling to begin, or `None` once the root has
/// completed.
pub(crate) fn complete_unit_of_work(
    cx: &mut RenderCx<'_>,
    unit: FiberRef,
) -> Result<Option<FiberRef>, RenderError> {
    let mut wip = unit;
    loop {
        let current = cx.arena.alternate(wip);
        complete_work(cx, current, wip)?;
        reset_child_expiration_time(cx, wip)?;

        let (effect_tag, sibling, return_fiber) = {
            let fiber = cx.arena.get(wip)?;
            (fiber.effect_tag, fiber.sibling, fiber.return_fiber)
        };
        if effect_tag.has_side_effects() {
            cx.session.effects.push(Effect::Work(wip));
        }
        trace!(fiber = %wip, effects = ?effect_tag, "complete");

        if let Some(sibling) = sibling {
            return Ok(Some(sibling));
        }
        match return_fiber {
            Some(parent) => wip = parent,
            None => return Ok(None),
        }
    }
}

fn complete_work(
    cx: &mut RenderCx<'_>,
    current: Option<FiberRef>,
    wip: FiberRef,
) -> Result<(), RenderError> {
    let tag = cx.arena.get(wip)?.tag;
    match tag {
        WorkTag::HostComponent => complete_host_component(cx, current, wip),
        WorkTag::HostText => complete_host_text(cx, current, wip),
        WorkTag::HostRoot => {
            cx.session.swap_context = cx.session.context_changed;
            Ok(())
        }
        WorkTag::IndeterminateComponent | WorkTag::FunctionComponent | WorkTag::Fragment => Ok(()),
    }
}

fn complete_host_component(
    cx: &mut RenderCx<'_>,
    current: Option<FiberRef>,
    wip: FiberRef,
) -> Result<(), RenderError> {
    let (element_type, new_props, handle) = {
        let fiber = cx.arena.get(wip)?;
        (host_type_of(fiber), fiber.pending_props.clone(), fiber.host_handle())
    };

    if let (Some(current), Some(handle)) = (current, handle) {
        let old_props = cx.arena.get(current)?.memoized_props.clone();
        if let Some(old_props) = old_props {
            if !old_props.ptr_eq(&new_props) {
                let payload = cx.host.prepare_update(handle, &element_type, &old_props, &new_props);
                if let Some(payload) = payload.filter(|p| !p.is_empty()) {
                    let fiber = cx.arena.get_mut(wip)?;
                    fiber.host_update = Some(payload);
                    fiber.effect_tag.insert(EffectTag::UPDATE);
                }
            }
        }
        return Ok(());
    }

    let instance = cx.host.create_instance(&element_type, &new_props)?;
    append_all_children(cx, instance, wip)?;
    cx.host
        .finalize_initial_children(instance, &element_type, &new_props)?;
    cx.arena.get_mut(wip)?.state_node = StateNode::Host(instance);
    Ok(())
}

fn complete_host_text(
    cx: &mut RenderCx<'_>,
    current: Option<FiberRef>,
    wip: FiberRef,
) -> Result<(), RenderError> {
    let (new_text, handle) = {
        let fiber = cx.arena.get(wip)?;
        (
            fiber.text_content().unwrap_or_default().to_owned(),
            fiber.host_handle(),
        )
    };

    if let (Some(current), Some(_)) = (current, handle) {
        let changed = {
            let old = cx.arena.get(current)?;
            let old_text = old
                .memoized_props
                .as_ref()
                .and_then(|p| p.text_content())
                .unwrap_or_default();
            old_text != new_text
        };
        if changed {
            cx.arena.get_mut(wip)?.effect_tag.insert(EffectTag::UPDATE);
        }
        return Ok(());
    }

    let instance = cx.host.create_text_instance(&new_text)?;
    cx.arena.get_mut(wip)?.state_node = StateNode::Host(instance);
    Ok(())
}

/// Attach the top-level host nodes below `wip` to the freshly created
/// `parent`, looking through components and fragments.
fn append_all_children(
    cx: &mut RenderCx<'_>,
    parent: HostHandle,
    wip: FiberRef,
) -> Result<(), RenderError> {
    let Some(mut node) = cx.arena.child_of(wip)? else {
        return Ok(());
    };
    loop {
        let (tag, handle, child) = {
            let fiber = cx.arena.get(node)?;
            (fiber.tag, fiber.host_handle(), fiber.child)
        };
        if tag.is_host() {
            let handle = handle.ok_or(RenderError::MissingHostInstance {
                instance: node.instance(),
            })?;
            cx.host.append_initial_child(parent, handle)?;
        } else if let Some(child) = child {
            cx.arena.set_return(child, Some(node))?;
            node = child;
            continue;
        }

        loop {
            if let Some(sibling) = cx.arena.sibling_of(node)? {
                let parent_fiber = cx.arena.return_of(node)?;
                cx.arena.set_return(sibling, parent_fiber)?;
                node = sibling;
                break;
            }
            match cx.arena.return_of(node)? {
                Some(up) if up.instance() != wip.instance() => node = up,
                _ => return Ok(()),
            }
        }
    }
}

/// Recompute the most urgent pending work below `wip` from its
/// children's own and subtree expirations.
fn reset_child_expiration_time(cx: &mut RenderCx<'_>, wip: FiberRef) -> Result<(), RenderError> {
    let mut most_urgent = ExpirationTime::NO_WORK;
    let mut child = cx.arena.get(wip)?.child;
    while let Some(c) = child {
        let fiber = cx.arena.get(c)?;
        most_urgent = most_urgent
            .most_urgent(fiber.expiration_time)
            .most_urgent(fiber.child_expiration_time);
        child = fiber.sibling;
    }
    cx.arena.get_mut(wip)?.child_expiration_time = most_urgent;
    Ok(())
}
