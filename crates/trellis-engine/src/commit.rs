//! Commit phase: apply a finished tree's effect list to the host.
//!
//! Two passes run over the list. The mutation pass performs deletions,
//! insertions, and property updates and detaches outgoing refs. The root
//! then switches to the finished tree, and the layout pass attaches refs
//! and fires update callbacks.

use std::sync::Arc;
use std::time::Instant;

use tracing::trace;
use trellis_arena::{ArenaError, FiberArena, FiberRef};
use trellis_core::{EffectTag, HostConfig, HostError, HostHandle, Props, WorkTag};

use crate::begin_work::host_type_of;
use crate::error::CommitError;
use crate::metrics::{add_micros, RenderMetrics};
use crate::root::Root;
use crate::session::Effect;

pub(crate) struct CommitCx<'a> {
    pub(crate) arena: &'a mut FiberArena,
    pub(crate) host: &'a mut dyn HostConfig,
    pub(crate) metrics: &'a mut RenderMetrics,
}

/// Apply `effects` and make `finished` the root's current tree.
pub(crate) fn commit_root(
    cx: &mut CommitCx<'_>,
    root: &mut Root,
    finished: FiberRef,
    effects: &[Effect],
) -> Result<(), CommitError> {
    let started = Instant::now();

    for effect in effects {
        match *effect {
            Effect::Deletion(fiber) => commit_deletion(cx, fiber)?,
            Effect::Work(fiber) => commit_mutation_effects(cx, fiber)?,
        }
    }

    root.current = finished;

    for effect in effects {
        if let Effect::Work(fiber) = *effect {
            commit_layout_effects(cx, fiber)?;
        }
    }

    add_micros(&mut cx.metrics.commit_us, started.elapsed());
    Ok(())
}

fn host_failure(effect: EffectTag, fiber: FiberRef) -> impl FnOnce(HostError) -> CommitError {
    move |source| CommitError::Host {
        effect,
        instance: fiber.instance(),
        source,
    }
}

fn require_handle(handle: Option<HostHandle>, fiber: FiberRef) -> Result<HostHandle, CommitError> {
    handle.ok_or(CommitError::MissingHostInstance {
        instance: fiber.instance(),
    })
}

// ── Mutation pass ───────────────────────────────────────────────

fn commit_mutation_effects(cx: &mut CommitCx<'_>, fiber: FiberRef) -> Result<(), CommitError> {
    let effect = cx.arena.get(fiber)?.effect_tag;

    if effect.contains(EffectTag::CONTENT_RESET) {
        let handle = require_handle(cx.arena.get(fiber)?.host_handle(), fiber)?;
        cx.host
            .reset_text_content(handle)
            .map_err(host_failure(EffectTag::CONTENT_RESET, fiber))?;
    }
    if effect.contains(EffectTag::REF) {
        if let Some(current) = cx.arena.alternate(fiber) {
            detach_ref(cx.arena, current)?;
        }
    }
    if effect.contains(EffectTag::PLACEMENT) {
        commit_placement(cx, fiber)?;
        cx.arena.get_mut(fiber)?.effect_tag.remove(EffectTag::PLACEMENT);
    }
    if effect.contains(EffectTag::UPDATE) {
        commit_work(cx, fiber)?;
    }
    Ok(())
}

fn commit_work(cx: &mut CommitCx<'_>, finished: FiberRef) -> Result<(), CommitError> {
    let (tag, handle, new_props, payload, element_type) = {
        let fiber = cx.arena.get(finished)?;
        (
            fiber.tag,
            fiber.host_handle(),
            fiber
                .memoized_props
                .clone()
                .unwrap_or_else(|| fiber.pending_props.clone()),
            fiber.host_update.clone(),
            host_type_of(fiber),
        )
    };
    let old_props: Props = match cx.arena.alternate(finished) {
        Some(current) => cx
            .arena
            .get(current)?
            .memoized_props
            .clone()
            .unwrap_or_else(|| new_props.clone()),
        None => new_props.clone(),
    };

    match tag {
        WorkTag::HostComponent => {
            let Some(payload) = payload else {
                return Ok(());
            };
            let handle = require_handle(handle, finished)?;
            cx.host
                .commit_update(handle, &payload, &element_type, &old_props, &new_props)
                .map_err(host_failure(EffectTag::UPDATE, finished))?;
            cx.arena.get_mut(finished)?.host_update = None;
            cx.metrics.updates += 1;
        }
        WorkTag::HostText => {
            let handle = require_handle(handle, finished)?;
            let new_text = new_props.text_content().unwrap_or_default();
            let old_text = old_props.text_content().unwrap_or_default();
            cx.host
                .commit_text_update(handle, old_text, new_text)
                .map_err(host_failure(EffectTag::UPDATE, finished))?;
            cx.metrics.updates += 1;
        }
        _ => {}
    }
    Ok(())
}

fn commit_placement(cx: &mut CommitCx<'_>, finished: FiberRef) -> Result<(), CommitError> {
    let parent_fiber = host_parent_fiber(cx.arena, finished)?;
    let (parent, parent_effect) = {
        let fiber = cx.arena.get(parent_fiber)?;
        (fiber.state_node.host_handle(), fiber.effect_tag)
    };
    let parent = require_handle(parent, parent_fiber)?;
    if parent_effect.contains(EffectTag::CONTENT_RESET) {
        cx.host
            .reset_text_content(parent)
            .map_err(host_failure(EffectTag::CONTENT_RESET, parent_fiber))?;
        cx.arena
            .get_mut(parent_fiber)?
            .effect_tag
            .remove(EffectTag::CONTENT_RESET);
    }

    let before = host_sibling(cx.arena, finished)?;
    trace!(fiber = %finished, ?before, "placement");
    cx.metrics.placements += 1;

    let mut node = finished;
    loop {
        let (tag, handle, child) = {
            let fiber = cx.arena.get(node)?;
            (fiber.tag, fiber.host_handle(), fiber.child)
        };
        if tag.is_host() {
            let handle = require_handle(handle, node)?;
            let result = match before {
                Some(before) => cx.host.insert_before(parent, handle, before),
                None => cx.host.append_child(parent, handle),
            };
            result.map_err(host_failure(EffectTag::PLACEMENT, node))?;
        } else if let Some(child) = child {
            cx.arena.set_return(child, Some(node))?;
            node = child;
            continue;
        }
        if node == finished {
            return Ok(());
        }
        loop {
            if let Some(sibling) = cx.arena.sibling_of(node)? {
                let up = cx.arena.return_of(node)?;
                cx.arena.set_return(sibling, up)?;
                node = sibling;
                break;
            }
            match cx.arena.return_of(node)? {
                Some(up) if up.instance() != finished.instance() => node = up,
                _ => return Ok(()),
            }
        }
    }
}

/// Nearest ancestor that owns a host node children can be inserted into.
fn host_parent_fiber(arena: &FiberArena, fiber: FiberRef) -> Result<FiberRef, CommitError> {
    let mut parent = arena.return_of(fiber)?;
    while let Some(p) = parent {
        if arena.get(p)?.tag.is_host_parent() {
            return Ok(p);
        }
        parent = arena.return_of(p)?;
    }
    Err(CommitError::MissingHostInstance {
        instance: fiber.instance(),
    })
}

/// The host node `fiber`'s host nodes must be inserted before, skipping
/// siblings that are themselves about to be placed. `None` appends.
fn host_sibling(arena: &mut FiberArena, fiber: FiberRef) -> Result<Option<HostHandle>, CommitError> {
    let mut node = fiber;
    'siblings: loop {
        let next = loop {
            if let Some(sibling) = arena.sibling_of(node)? {
                break sibling;
            }
            match arena.return_of(node)? {
                Some(up) if !arena.get(up)?.tag.is_host_parent() => node = up,
                _ => return Ok(None),
            }
        };
        let up = arena.return_of(node)?;
        arena.set_return(next, up)?;
        node = next;

        loop {
            let (tag, effect, child) = {
                let f = arena.get(node)?;
                (f.tag, f.effect_tag, f.child)
            };
            if tag.is_host() {
                break;
            }
            if effect.contains(EffectTag::PLACEMENT) {
                continue 'siblings;
            }
            match child {
                Some(child) => {
                    arena.set_return(child, Some(node))?;
                    node = child;
                }
                None => continue 'siblings,
            }
        }

        let candidate = arena.get(node)?;
        if !candidate.effect_tag.contains(EffectTag::PLACEMENT) {
            return Ok(candidate.host_handle());
        }
    }
}

// ── Deletion ────────────────────────────────────────────────────

fn commit_deletion(cx: &mut CommitCx<'_>, current: FiberRef) -> Result<(), CommitError> {
    let subtree = collect_subtree(cx.arena, current)?;
    for fiber in &subtree {
        detach_ref(cx.arena, *fiber)?;
    }
    unmount_host_components(cx, current)?;
    for fiber in subtree {
        cx.arena.free(fiber.instance())?;
    }
    cx.metrics.deletions += 1;
    trace!(fiber = %current, "deleted");
    Ok(())
}

/// Remove the topmost host nodes of `current`'s subtree from their host
/// parent. Nested host nodes leave with their ancestors.
fn unmount_host_components(cx: &mut CommitCx<'_>, current: FiberRef) -> Result<(), CommitError> {
    let parent_fiber = host_parent_fiber(cx.arena, current)?;
    let parent = require_handle(cx.arena.get(parent_fiber)?.state_node.host_handle(), parent_fiber)?;

    let mut node = current;
    loop {
        let (tag, handle, child) = {
            let fiber = cx.arena.get(node)?;
            (fiber.tag, fiber.host_handle(), fiber.child)
        };
        if tag.is_host() {
            let handle = require_handle(handle, node)?;
            cx.host
                .remove_child(parent, handle)
                .map_err(host_failure(EffectTag::DELETION, node))?;
        } else if let Some(child) = child {
            cx.arena.set_return(child, Some(node))?;
            node = child;
            continue;
        }
        if node == current {
            return Ok(());
        }
        loop {
            if let Some(sibling) = cx.arena.sibling_of(node)? {
                let up = cx.arena.return_of(node)?;
                cx.arena.set_return(sibling, up)?;
                node = sibling;
                break;
            }
            match cx.arena.return_of(node)? {
                Some(up) if up.instance() != current.instance() => node = up,
                _ => return Ok(()),
            }
        }
    }
}

/// Every fiber in the subtree rooted at `root`, parents before children.
pub(crate) fn collect_subtree(arena: &FiberArena, root: FiberRef) -> Result<Vec<FiberRef>, ArenaError> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(fiber) = stack.pop() {
        out.push(fiber);
        let mut child = arena.child_of(fiber)?;
        let start = stack.len();
        while let Some(c) = child {
            stack.push(c);
            child = arena.sibling_of(c)?;
        }
        stack[start..].reverse();
    }
    Ok(out)
}

// ── Layout pass ─────────────────────────────────────────────────

fn commit_layout_effects(cx: &mut CommitCx<'_>, fiber: FiberRef) -> Result<(), CommitError> {
    let effect = cx.arena.get(fiber)?.effect_tag;
    if effect.contains(EffectTag::CALLBACK) {
        let callbacks = match cx.arena.get_mut(fiber)?.update_queue.as_mut() {
            Some(queue) => Arc::make_mut(queue).take_callbacks(),
            None => Vec::new(),
        };
        for callback in callbacks {
            callback();
        }
    }
    if effect.contains(EffectTag::REF) {
        let fiber = cx.arena.get(fiber)?;
        if let (Some(callback), Some(handle)) = (&fiber.ref_callback, fiber.host_handle()) {
            callback(Some(handle));
        }
    }
    Ok(())
}

fn detach_ref(arena: &FiberArena, fiber: FiberRef) -> Result<(), CommitError> {
    let fiber = arena.get(fiber)?;
    if fiber.tag == WorkTag::HostComponent {
        if let Some(callback) = &fiber.ref_callback {
            callback(None);
        }
    }
    Ok(())
}
