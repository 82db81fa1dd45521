//! Child reconciliation: diff a fiber's current children against the
//! children it just rendered.
//!
//! Matching is positional until the first mismatch, then falls back to a
//! key map built from the remaining old children. A reused fiber that
//! moved left of the highest old index already placed is tagged for
//! placement; anything left in the map is deleted.
//!
//! ```text
//! old:  A0 B1 C2          new: C A B
//!       C  (old 2) -> keep, watermark 2
//!       A  (old 0) -> 0 < 2, Placement
//!       B  (old 1) -> 1 < 2, Placement
//! ```
//!
//! Two instances exist: one that tracks side effects (updates) and one
//! that does not (mounts, where the whole subtree is inserted at once).

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::warn;
use trellis_arena::{Fiber, FiberRef};
use trellis_core::{EffectTag, Element, ElementType, Key, Node, Props, RefCallback, WorkTag};

use crate::error::RenderError;
use crate::session::Effect;
use crate::work_loop::RenderCx;

/// Lookup key for an old child: its explicit key, or its index.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum ChildKey {
    Key(Key),
    Index(u32),
}

impl ChildKey {
    fn of(key: Option<&Key>, index: u32) -> Self {
        match key {
            Some(k) => Self::Key(k.clone()),
            None => Self::Index(index),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct ChildReconciler {
    track_side_effects: bool,
}

impl ChildReconciler {
    /// For fibers with a current counterpart.
    pub(crate) const UPDATE: Self = Self {
        track_side_effects: true,
    };
    /// For fibers rendering for the first time.
    pub(crate) const MOUNT: Self = Self {
        track_side_effects: false,
    };

    /// Reconcile `new_child` against the old children starting at
    /// `current_first`, returning the first new child.
    pub(crate) fn reconcile_child_fibers(
        self,
        cx: &mut RenderCx<'_>,
        return_fiber: FiberRef,
        current_first: Option<FiberRef>,
        new_child: &Node,
    ) -> Result<Option<FiberRef>, RenderError> {
        match unwrap_top_level_fragment(new_child) {
            Node::Element(element) => {
                let fiber = self.reconcile_single_element(cx, return_fiber, current_first, element)?;
                self.place_single_child(cx, fiber)?;
                Ok(Some(fiber))
            }
            Node::Text(text) => {
                let fiber = self.reconcile_single_text_node(cx, return_fiber, current_first, text)?;
                self.place_single_child(cx, fiber)?;
                Ok(Some(fiber))
            }
            Node::List(items) => {
                self.reconcile_children_array(cx, return_fiber, current_first, items)
            }
            Node::Empty => {
                self.delete_remaining_children(cx, current_first)?;
                Ok(None)
            }
        }
    }

    // ── Deletion ────────────────────────────────────────────────

    fn delete_child(self, cx: &mut RenderCx<'_>, child: FiberRef) {
        if self.track_side_effects {
            cx.session.effects.push(Effect::Deletion(child));
        }
    }

    fn delete_remaining_children(
        self,
        cx: &mut RenderCx<'_>,
        first: Option<FiberRef>,
    ) -> Result<(), RenderError> {
        if !self.track_side_effects {
            return Ok(());
        }
        let mut child = first;
        while let Some(c) = child {
            self.delete_child(cx, c);
            child = cx.arena.sibling_of(c)?;
        }
        Ok(())
    }

    fn map_remaining_children(
        self,
        cx: &RenderCx<'_>,
        first: Option<FiberRef>,
    ) -> Result<IndexMap<ChildKey, FiberRef>, RenderError> {
        let mut map = IndexMap::new();
        let mut child = first;
        while let Some(c) = child {
            let fiber = cx.arena.get(c)?;
            map.insert(ChildKey::of(fiber.key.as_ref(), fiber.index), c);
            child = fiber.sibling;
        }
        Ok(map)
    }

    // ── Fiber creation and reuse ────────────────────────────────

    fn use_fiber(
        self,
        cx: &mut RenderCx<'_>,
        fiber: FiberRef,
        pending_props: Props,
        return_fiber: FiberRef,
    ) -> Result<FiberRef, RenderError> {
        let clone = cx.session.clone_fiber(cx.arena, fiber, pending_props)?;
        let f = cx.arena.get_mut(clone)?;
        f.index = 0;
        f.sibling = None;
        f.return_fiber = Some(return_fiber);
        Ok(clone)
    }

    fn create_fiber(
        self,
        cx: &mut RenderCx<'_>,
        fiber: Fiber,
        return_fiber: FiberRef,
    ) -> Result<FiberRef, RenderError> {
        Ok(cx.session.allocate(cx.arena, fiber, return_fiber)?)
    }

    fn place_child(
        self,
        cx: &mut RenderCx<'_>,
        new_fiber: FiberRef,
        last_placed_index: u32,
        new_index: u32,
    ) -> Result<u32, RenderError> {
        cx.arena.get_mut(new_fiber)?.index = new_index;
        if !self.track_side_effects {
            return Ok(last_placed_index);
        }
        match cx.arena.alternate(new_fiber) {
            Some(current) => {
                let old_index = cx.arena.get(current)?.index;
                if old_index < last_placed_index {
                    cx.arena.get_mut(new_fiber)?.effect_tag.insert(EffectTag::PLACEMENT);
                    Ok(last_placed_index)
                } else {
                    Ok(old_index)
                }
            }
            None => {
                cx.arena.get_mut(new_fiber)?.effect_tag.insert(EffectTag::PLACEMENT);
                Ok(last_placed_index)
            }
        }
    }

    fn place_single_child(self, cx: &mut RenderCx<'_>, fiber: FiberRef) -> Result<(), RenderError> {
        if self.track_side_effects && cx.arena.alternate(fiber).is_none() {
            cx.arena.get_mut(fiber)?.effect_tag.insert(EffectTag::PLACEMENT);
        }
        Ok(())
    }

    // ── Slot updates ────────────────────────────────────────────

    fn update_text_node(
        self,
        cx: &mut RenderCx<'_>,
        return_fiber: FiberRef,
        current: Option<FiberRef>,
        text: &Arc<str>,
    ) -> Result<FiberRef, RenderError> {
        if let Some(c) = current {
            if cx.arena.get(c)?.tag == WorkTag::HostText {
                return self.use_fiber(cx, c, Props::text(text.clone()), return_fiber);
            }
        }
        self.create_fiber(cx, Fiber::text(text.clone()), return_fiber)
    }

    fn update_element(
        self,
        cx: &mut RenderCx<'_>,
        return_fiber: FiberRef,
        current: Option<FiberRef>,
        element: &Element,
    ) -> Result<FiberRef, RenderError> {
        if let Some(c) = current {
            let same_type = cx
                .arena
                .get(c)?
                .element_type
                .as_ref()
                .is_some_and(|t| t.is_same_type(element.element_type()));
            if same_type {
                let existing = self.use_fiber(cx, c, element.props().clone(), return_fiber)?;
                cx.arena.get_mut(existing)?.ref_callback = coerce_ref(element);
                return Ok(existing);
            }
        }
        self.create_fiber(cx, fiber_from_element(element), return_fiber)
    }

    fn update_fragment(
        self,
        cx: &mut RenderCx<'_>,
        return_fiber: FiberRef,
        current: Option<FiberRef>,
        props: Props,
        key: Option<Key>,
    ) -> Result<FiberRef, RenderError> {
        if let Some(c) = current {
            if cx.arena.get(c)?.tag == WorkTag::Fragment {
                return self.use_fiber(cx, c, props, return_fiber);
            }
        }
        self.create_fiber(cx, Fiber::new(WorkTag::Fragment, key, props), return_fiber)
    }

    fn create_child(
        self,
        cx: &mut RenderCx<'_>,
        return_fiber: FiberRef,
        node: &Node,
    ) -> Result<Option<FiberRef>, RenderError> {
        let fiber = match node {
            Node::Empty => return Ok(None),
            Node::Text(text) => Fiber::text(text.clone()),
            Node::Element(element) => fiber_from_element(element),
            Node::List(_) => Fiber::new(WorkTag::Fragment, None, Props::from_children(node.clone())),
        };
        self.create_fiber(cx, fiber, return_fiber).map(Some)
    }

    /// Try to reuse `old` for `node` at the same position. `None` when
    /// the keys differ.
    fn update_slot(
        self,
        cx: &mut RenderCx<'_>,
        return_fiber: FiberRef,
        old: Option<FiberRef>,
        node: &Node,
    ) -> Result<Option<FiberRef>, RenderError> {
        let key = match old {
            Some(o) => cx.arena.get(o)?.key.clone(),
            None => None,
        };
        match node {
            Node::Empty => Ok(None),
            Node::Text(text) => {
                if key.is_some() {
                    return Ok(None);
                }
                self.update_text_node(cx, return_fiber, old, text).map(Some)
            }
            Node::Element(element) => {
                if element.key() != key.as_ref() {
                    return Ok(None);
                }
                if element.is_fragment() {
                    self.update_fragment(cx, return_fiber, old, element.props().clone(), key)
                        .map(Some)
                } else {
                    self.update_element(cx, return_fiber, old, element).map(Some)
                }
            }
            Node::List(_) => {
                if key.is_some() {
                    return Ok(None);
                }
                self.update_fragment(cx, return_fiber, old, Props::from_children(node.clone()), None)
                    .map(Some)
            }
        }
    }

    fn update_from_map(
        self,
        cx: &mut RenderCx<'_>,
        existing: &IndexMap<ChildKey, FiberRef>,
        return_fiber: FiberRef,
        new_index: u32,
        node: &Node,
    ) -> Result<Option<FiberRef>, RenderError> {
        match node {
            Node::Empty => Ok(None),
            Node::Text(text) => {
                let matched = existing.get(&ChildKey::Index(new_index)).copied();
                self.update_text_node(cx, return_fiber, matched, text).map(Some)
            }
            Node::Element(element) => {
                let matched = existing
                    .get(&ChildKey::of(element.key(), new_index))
                    .copied();
                if element.is_fragment() {
                    self.update_fragment(
                        cx,
                        return_fiber,
                        matched,
                        element.props().clone(),
                        element.key().cloned(),
                    )
                    .map(Some)
                } else {
                    self.update_element(cx, return_fiber, matched, element).map(Some)
                }
            }
            Node::List(_) => {
                let matched = existing.get(&ChildKey::Index(new_index)).copied();
                self.update_fragment(cx, return_fiber, matched, Props::from_children(node.clone()), None)
                    .map(Some)
            }
        }
    }

    // ── Reconciliation ──────────────────────────────────────────

    fn reconcile_children_array(
        self,
        cx: &mut RenderCx<'_>,
        return_fiber: FiberRef,
        current_first: Option<FiberRef>,
        new_children: &[Node],
    ) -> Result<Option<FiberRef>, RenderError> {
        check_duplicate_keys(return_fiber, new_children)?;

        let mut first: Option<FiberRef> = None;
        let mut previous: Option<FiberRef> = None;
        let mut old_fiber = current_first;
        let mut last_placed_index = 0u32;
        let mut new_index = 0usize;

        // Walk both lists in step until a key mismatch.
        while new_index < new_children.len() {
            let Some(old) = old_fiber else { break };
            let old_index = cx.arena.get(old)?.index as usize;
            let (slot_fiber, next_old) = if old_index > new_index {
                (None, Some(old))
            } else {
                (Some(old), cx.arena.sibling_of(old)?)
            };
            let Some(new_fiber) =
                self.update_slot(cx, return_fiber, slot_fiber, &new_children[new_index])?
            else {
                break;
            };
            if let Some(replaced) = slot_fiber {
                if self.track_side_effects && cx.arena.alternate(new_fiber).is_none() {
                    self.delete_child(cx, replaced);
                }
            }
            last_placed_index = self.place_child(cx, new_fiber, last_placed_index, new_index as u32)?;
            link(cx, &mut first, &mut previous, new_fiber)?;
            old_fiber = next_old;
            new_index += 1;
        }

        if new_index == new_children.len() {
            self.delete_remaining_children(cx, old_fiber)?;
            return Ok(first);
        }

        if old_fiber.is_none() {
            for (i, node) in new_children.iter().enumerate().skip(new_index) {
                let Some(new_fiber) = self.create_child(cx, return_fiber, node)? else {
                    continue;
                };
                last_placed_index = self.place_child(cx, new_fiber, last_placed_index, i as u32)?;
                link(cx, &mut first, &mut previous, new_fiber)?;
            }
            return Ok(first);
        }

        let mut existing = self.map_remaining_children(cx, old_fiber)?;
        for (i, node) in new_children.iter().enumerate().skip(new_index) {
            let Some(new_fiber) = self.update_from_map(cx, &existing, return_fiber, i as u32, node)?
            else {
                continue;
            };
            if self.track_side_effects && cx.arena.alternate(new_fiber).is_some() {
                let key = ChildKey::of(cx.arena.get(new_fiber)?.key.as_ref(), i as u32);
                existing.shift_remove(&key);
            }
            last_placed_index = self.place_child(cx, new_fiber, last_placed_index, i as u32)?;
            link(cx, &mut first, &mut previous, new_fiber)?;
        }

        if self.track_side_effects {
            for (_, unmatched) in existing {
                self.delete_child(cx, unmatched);
            }
        }
        Ok(first)
    }

    fn reconcile_single_element(
        self,
        cx: &mut RenderCx<'_>,
        return_fiber: FiberRef,
        current_first: Option<FiberRef>,
        element: &Element,
    ) -> Result<FiberRef, RenderError> {
        let key = element.key();
        let mut child = current_first;
        while let Some(c) = child {
            let (key_matches, type_matches, sibling) = {
                let fiber = cx.arena.get(c)?;
                let type_matches = if element.is_fragment() {
                    fiber.tag == WorkTag::Fragment
                } else {
                    fiber
                        .element_type
                        .as_ref()
                        .is_some_and(|t| t.is_same_type(element.element_type()))
                };
                (fiber.key.as_ref() == key, type_matches, fiber.sibling)
            };
            if key_matches {
                if type_matches {
                    self.delete_remaining_children(cx, sibling)?;
                    let existing = self.use_fiber(cx, c, element.props().clone(), return_fiber)?;
                    cx.arena.get_mut(existing)?.ref_callback = coerce_ref(element);
                    return Ok(existing);
                }
                self.delete_remaining_children(cx, Some(c))?;
                break;
            }
            self.delete_child(cx, c);
            child = sibling;
        }
        self.create_fiber(cx, fiber_from_element(element), return_fiber)
    }

    fn reconcile_single_text_node(
        self,
        cx: &mut RenderCx<'_>,
        return_fiber: FiberRef,
        current_first: Option<FiberRef>,
        text: &Arc<str>,
    ) -> Result<FiberRef, RenderError> {
        if let Some(c) = current_first {
            let (tag, sibling) = {
                let fiber = cx.arena.get(c)?;
                (fiber.tag, fiber.sibling)
            };
            if tag == WorkTag::HostText {
                self.delete_remaining_children(cx, sibling)?;
                return self.use_fiber(cx, c, Props::text(text.clone()), return_fiber);
            }
        }
        self.delete_remaining_children(cx, current_first)?;
        self.create_fiber(cx, Fiber::text(text.clone()), return_fiber)
    }
}

/// An unkeyed fragment element at the top of a render result is treated
/// as its children.
fn unwrap_top_level_fragment(mut node: &Node) -> &Node {
    while let Node::Element(element) = node {
        if element.is_fragment() && element.key().is_none() {
            node = element.props().children();
        } else {
            break;
        }
    }
    node
}

fn link(
    cx: &mut RenderCx<'_>,
    first: &mut Option<FiberRef>,
    previous: &mut Option<FiberRef>,
    new_fiber: FiberRef,
) -> Result<(), RenderError> {
    match *previous {
        None => *first = Some(new_fiber),
        Some(p) => cx.arena.get_mut(p)?.sibling = Some(new_fiber),
    }
    *previous = Some(new_fiber);
    Ok(())
}

fn check_duplicate_keys(return_fiber: FiberRef, children: &[Node]) -> Result<(), RenderError> {
    let mut seen: HashSet<&Key> = HashSet::new();
    for child in children {
        if let Some(key) = child.as_element().and_then(Element::key) {
            if !seen.insert(key) {
                return Err(RenderError::DuplicateKey {
                    key: key.clone(),
                    parent: return_fiber.instance(),
                });
            }
        }
    }
    Ok(())
}

fn fiber_from_element(element: &Element) -> Fiber {
    let (tag, element_type) = match element.element_type() {
        ElementType::Host(_) => (WorkTag::HostComponent, Some(element.element_type().clone())),
        ElementType::Component(_) => (
            WorkTag::IndeterminateComponent,
            Some(element.element_type().clone()),
        ),
        ElementType::Fragment => (WorkTag::Fragment, None),
    };
    let mut fiber = Fiber::new(tag, element.key().cloned(), element.props().clone());
    fiber.element_type = element_type;
    fiber.ref_callback = coerce_ref(element);
    fiber
}

/// Refs attach to host elements only.
fn coerce_ref(element: &Element) -> Option<RefCallback> {
    let callback = element.ref_callback()?;
    match element.element_type() {
        ElementType::Host(_) => Some(callback.clone()),
        other => {
            warn!(element = other.name(), "ref on a non-host element is ignored");
            None
        }
    }
}
