//! State scoped to one render pass of one root.
//!
//! Everything the render phase would otherwise keep in globals (the
//! render expiration, the next unit of work, the effect list) lives in a
//! [`RenderSession`]. The reconciler holds at most one session, so only
//! one render can be in flight at a time.

use trellis_arena::{Fiber, FiberArena, FiberRef};
use trellis_core::{ExpirationTime, InstanceId, Props, RootId, ValueMap};

use crate::metrics::RenderMetrics;

/// One entry of the effect list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Effect {
    /// Remove a fiber from the committed tree.
    Deletion(FiberRef),
    /// Apply the effect tag of a work-in-progress fiber.
    Work(FiberRef),
}

/// A completed render waiting to be committed.
pub(crate) struct FinishedWork {
    pub(crate) fiber: FiberRef,
    pub(crate) effects: Vec<Effect>,
    pub(crate) expiration: ExpirationTime,
    pub(crate) context: Option<ValueMap>,
    pub(crate) swap_context: bool,
    pub(crate) metrics: RenderMetrics,
}

pub(crate) struct RenderSession {
    pub(crate) root: RootId,
    pub(crate) expiration: ExpirationTime,
    pub(crate) root_wip: FiberRef,
    pub(crate) next_unit: Option<FiberRef>,
    pub(crate) effects: Vec<Effect>,
    /// Slots allocated during this pass; freed if the pass is discarded.
    pub(crate) created: Vec<InstanceId>,
    /// Root context visible to components.
    pub(crate) context: Option<ValueMap>,
    /// Set when the root carries a context not yet committed. Disables
    /// bailouts so every component observes it.
    pub(crate) context_changed: bool,
    pub(crate) swap_context: bool,
    pub(crate) metrics: RenderMetrics,
}

impl RenderSession {
    pub(crate) fn new(
        root: RootId,
        expiration: ExpirationTime,
        root_wip: FiberRef,
        context: Option<ValueMap>,
        context_changed: bool,
    ) -> Self {
        Self {
            root,
            expiration,
            root_wip,
            next_unit: Some(root_wip),
            effects: Vec::new(),
            created: Vec::new(),
            context,
            context_changed,
            swap_context: false,
            metrics: RenderMetrics::default(),
        }
    }

    /// Whether this session renders `root` at `expiration`.
    pub(crate) fn is_rendering(&self, root: RootId, expiration: ExpirationTime) -> bool {
        self.root == root && self.expiration == expiration
    }

    /// Allocate a fresh fiber that starts with work at this pass's level.
    pub(crate) fn allocate(
        &mut self,
        arena: &mut FiberArena,
        mut fiber: Fiber,
        return_fiber: FiberRef,
    ) -> Result<FiberRef, trellis_arena::ArenaError> {
        fiber.expiration_time = self.expiration;
        fiber.return_fiber = Some(return_fiber);
        let created = arena.allocate(fiber)?;
        self.created.push(created.instance());
        self.metrics.fibers_created += 1;
        Ok(created)
    }

    /// Clone `current` into its work-in-progress buffer.
    pub(crate) fn clone_fiber(
        &mut self,
        arena: &mut FiberArena,
        current: FiberRef,
        pending_props: Props,
    ) -> Result<FiberRef, trellis_arena::ArenaError> {
        self.metrics.fibers_cloned += 1;
        arena.create_work_in_progress(current, pending_props)
    }

    /// Throw the pass away, releasing every slot it allocated.
    pub(crate) fn discard(self, arena: &mut FiberArena) -> usize {
        let mut freed = 0;
        for instance in self.created {
            if arena.free(instance).is_ok() {
                freed += 1;
            }
        }
        freed
    }

    pub(crate) fn finish(self) -> FinishedWork {
        FinishedWork {
            fiber: self.root_wip,
            effects: self.effects,
            expiration: self.expiration,
            context: self.context,
            swap_context: self.swap_context,
            metrics: self.metrics,
        }
    }
}
