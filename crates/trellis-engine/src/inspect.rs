//! Read-only views of fiber trees and effect lists, for tests and
//! tooling.

use trellis_arena::{ArenaError, FiberArena, FiberRef};
use trellis_core::{EffectTag, ExpirationTime, HostHandle, InstanceId, Key, ValueMap, WorkTag};

use crate::session::Effect;

/// A snapshot of one fiber.
#[derive(Clone, Debug, PartialEq)]
pub struct FiberView {
    /// Stable identity.
    pub instance: InstanceId,
    /// Kind of node.
    pub tag: WorkTag,
    /// Sibling key, if any.
    pub key: Option<Key>,
    /// Element tag, component name, or a placeholder.
    pub type_name: String,
    /// Distance from the root fiber.
    pub depth: usize,
    /// Position among siblings.
    pub index: u32,
    /// Effect tag as last rendered.
    pub effect_tag: EffectTag,
    /// Pending work on the fiber itself.
    pub expiration_time: ExpirationTime,
    /// Pending work below the fiber.
    pub child_expiration_time: ExpirationTime,
    /// Memoized state.
    pub state: ValueMap,
    /// Text content, for text fibers.
    pub text: Option<String>,
    /// Host instance, if created.
    pub host: Option<HostHandle>,
}

/// A depth-first, pre-order list of a tree's fibers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TreeSnapshot {
    nodes: Vec<FiberView>,
}

impl TreeSnapshot {
    pub(crate) fn capture(arena: &FiberArena, root: FiberRef) -> Result<Self, ArenaError> {
        let mut nodes = Vec::new();
        let mut stack = vec![(root, 0usize)];
        while let Some((fiber_ref, depth)) = stack.pop() {
            let fiber = arena.get(fiber_ref)?;
            nodes.push(FiberView {
                instance: fiber_ref.instance(),
                tag: fiber.tag,
                key: fiber.key.clone(),
                type_name: fiber.type_name().to_string(),
                depth,
                index: fiber.index,
                effect_tag: fiber.effect_tag,
                expiration_time: fiber.expiration_time,
                child_expiration_time: fiber.child_expiration_time,
                state: fiber.memoized_state.clone(),
                text: (fiber.tag == WorkTag::HostText)
                    .then(|| fiber.text_content().unwrap_or_default().to_string()),
                host: fiber.host_handle(),
            });
            let children = arena.children(fiber_ref)?;
            for child in children.into_iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        Ok(Self { nodes })
    }

    /// All fibers in pre-order.
    pub fn nodes(&self) -> &[FiberView] {
        &self.nodes
    }

    /// Number of fibers.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// First fiber with key `key`.
    pub fn find_key(&self, key: &str) -> Option<&FiberView> {
        self.nodes
            .iter()
            .find(|n| n.key.as_ref().is_some_and(|k| k.as_str() == key))
    }

    /// First fiber whose type name is `name`.
    pub fn find_type(&self, name: &str) -> Option<&FiberView> {
        self.nodes.iter().find(|n| n.type_name == name)
    }

    /// Instance ids in pre-order.
    pub fn instances(&self) -> Vec<InstanceId> {
        self.nodes.iter().map(|n| n.instance).collect()
    }
}

/// One entry of a pending effect list.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectRecord {
    /// The affected instance.
    pub instance: InstanceId,
    /// Its type name.
    pub type_name: String,
    /// Its key.
    pub key: Option<Key>,
    /// What will happen. Deletions carry [`EffectTag::DELETION`].
    pub effect_tag: EffectTag,
}

/// The effect list of a finished, uncommitted render, in commit order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EffectSummary {
    /// Entries in the order the commit will apply them.
    pub records: Vec<EffectRecord>,
}

impl EffectSummary {
    pub(crate) fn capture(arena: &FiberArena, effects: &[Effect]) -> Result<Self, ArenaError> {
        let mut records = Vec::with_capacity(effects.len());
        for effect in effects {
            let (fiber_ref, forced) = match *effect {
                Effect::Deletion(f) => (f, Some(EffectTag::DELETION)),
                Effect::Work(f) => (f, None),
            };
            let fiber = arena.get(fiber_ref)?;
            records.push(EffectRecord {
                instance: fiber_ref.instance(),
                type_name: fiber.type_name().to_string(),
                key: fiber.key.clone(),
                effect_tag: forced.unwrap_or(fiber.effect_tag),
            });
        }
        Ok(Self { records })
    }

    /// Entries whose tag contains `tag`.
    pub fn with_tag(&self, tag: EffectTag) -> impl Iterator<Item = &EffectRecord> {
        self.records.iter().filter(move |r| r.effect_tag.contains(tag))
    }

    /// Number of placements.
    pub fn placements(&self) -> usize {
        self.with_tag(EffectTag::PLACEMENT).count()
    }

    /// Number of deletions.
    pub fn deletions(&self) -> usize {
        self.with_tag(EffectTag::DELETION).count()
    }

    /// Number of host updates.
    pub fn updates(&self) -> usize {
        self.with_tag(EffectTag::UPDATE).count()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
