//! The fiber record: one unit of reconciliation work.

use std::fmt;
use std::sync::Arc;

use trellis_core::{
    EffectTag, ElementType, ExpirationTime, HostHandle, Key, Props, RefCallback, RootId,
    UpdatePayload, UpdateQueue, ValueMap, WorkTag,
};

use crate::handle::FiberRef;

/// What a fiber is attached to outside the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StateNode {
    /// Nothing (components and fragments).
    #[default]
    None,
    /// A host element or text node.
    Host(HostHandle),
    /// A root and the host container it renders into.
    Root {
        /// The owning root.
        root: RootId,
        /// The container handle supplied when the root was created.
        container: HostHandle,
    },
}

impl StateNode {
    /// Handle of a host element, text node, or root container.
    pub fn host_handle(self) -> Option<HostHandle> {
        match self {
            Self::None => None,
            Self::Host(h) => Some(h),
            Self::Root { container, .. } => Some(container),
        }
    }
}

/// One buffer of a tree node.
///
/// Links (`return_fiber`, `child`, `sibling`) are arena references. A
/// bailed-out subtree is shared: the work-in-progress parent points at
/// children that still live on their current side.
#[derive(Clone)]
pub struct Fiber {
    /// Kind of node.
    pub tag: WorkTag,
    /// Sibling identity supplied by the element.
    pub key: Option<Key>,
    /// Element type; `None` for roots, text, and list fragments.
    pub element_type: Option<ElementType>,
    /// Props for the render in progress.
    pub pending_props: Props,
    /// Props used by the last completed render of this buffer.
    pub memoized_props: Option<Props>,
    /// State produced by the last render of this buffer.
    pub memoized_state: ValueMap,
    /// Pending state updates, shared with the alternate until written.
    pub update_queue: Option<Arc<UpdateQueue>>,
    /// Host property changes computed during completion.
    pub host_update: Option<UpdatePayload>,
    /// Host instance or root container.
    pub state_node: StateNode,
    /// Ref callback of the element.
    pub ref_callback: Option<RefCallback>,
    /// Position among siblings.
    pub index: u32,
    /// Commit-phase work for this fiber.
    pub effect_tag: EffectTag,
    /// Most urgent pending work on this fiber itself.
    pub expiration_time: ExpirationTime,
    /// Most urgent pending work anywhere below this fiber.
    pub child_expiration_time: ExpirationTime,
    /// Parent.
    pub return_fiber: Option<FiberRef>,
    /// First child.
    pub child: Option<FiberRef>,
    /// Next sibling.
    pub sibling: Option<FiberRef>,
}

impl Fiber {
    /// A fresh fiber with no links and no pending work.
    pub fn new(tag: WorkTag, key: Option<Key>, pending_props: Props) -> Self {
        Self {
            tag,
            key,
            element_type: None,
            pending_props,
            memoized_props: None,
            memoized_state: ValueMap::new(),
            update_queue: None,
            host_update: None,
            state_node: StateNode::None,
            ref_callback: None,
            index: 0,
            effect_tag: EffectTag::NO_EFFECT,
            expiration_time: ExpirationTime::NO_WORK,
            child_expiration_time: ExpirationTime::NO_WORK,
            return_fiber: None,
            child: None,
            sibling: None,
        }
    }

    /// The fiber at the top of a root's tree.
    pub fn host_root(root: RootId, container: HostHandle) -> Self {
        let mut fiber = Self::new(WorkTag::HostRoot, None, Props::empty());
        fiber.state_node = StateNode::Root { root, container };
        fiber.update_queue = Some(Arc::new(UpdateQueue::new(ValueMap::new())));
        fiber
    }

    /// A host text fiber.
    pub fn text(text: Arc<str>) -> Self {
        Self::new(WorkTag::HostText, None, Props::text(text))
    }

    /// Text of a host text fiber, taken from its pending props.
    pub fn text_content(&self) -> Option<&str> {
        self.pending_props.text_content()
    }

    /// Host element tag, if this is a host component.
    pub fn host_type(&self) -> Option<&str> {
        match &self.element_type {
            Some(ElementType::Host(tag)) => Some(tag),
            _ => None,
        }
    }

    /// Display name of the fiber's type.
    pub fn type_name(&self) -> &str {
        match (&self.element_type, self.tag) {
            (Some(t), _) => t.name(),
            (None, WorkTag::HostRoot) => "Root",
            (None, WorkTag::HostText) => "#text",
            (None, _) => "Fragment",
        }
    }

    /// Host handle, if the fiber has one.
    pub fn host_handle(&self) -> Option<HostHandle> {
        match self.state_node {
            StateNode::Host(h) => Some(h),
            _ => None,
        }
    }

    /// Whether this fiber or anything below it has work at `render`.
    pub fn subtree_has_work(&self, render: ExpirationTime) -> bool {
        self.expiration_time.covers(render) || self.child_expiration_time.covers(render)
    }
}

impl fmt::Debug for Fiber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("tag", &self.tag)
            .field("type", &self.type_name())
            .field("key", &self.key)
            .field("index", &self.index)
            .field("effect_tag", &self.effect_tag)
            .field("expiration_time", &self.expiration_time)
            .field("child_expiration_time", &self.child_expiration_time)
            .field("state_node", &self.state_node)
            .field("return_fiber", &self.return_fiber)
            .field("child", &self.child)
            .field("sibling", &self.sibling)
            .finish_non_exhaustive()
    }
}
