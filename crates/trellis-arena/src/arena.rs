//! Slot storage with free-list reuse and generation checks.

use smallvec::SmallVec;
use trellis_core::{EffectTag, InstanceId, Props};

use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::fiber::Fiber;
use crate::handle::{FiberRef, Side};

struct Slot {
    generation: u32,
    live: bool,
    buffers: [Option<Fiber>; 2],
}

/// Allocation counters, reset on demand.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Slots handed out from fresh storage.
    pub slot_allocations: u64,
    /// Slots handed out from the free list.
    pub slot_reuses: u64,
    /// Work-in-progress buffers that had no previous occupant.
    pub buffer_allocations: u64,
    /// Work-in-progress buffers written over a previous render's fiber.
    pub buffer_reuses: u64,
    /// Slots returned to the free list.
    pub frees: u64,
}

/// Owner of every fiber buffer of every tree.
pub struct FiberArena {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    live: u32,
    config: ArenaConfig,
    stats: ArenaStats,
}

impl FiberArena {
    /// Create an empty arena.
    pub fn new(config: ArenaConfig) -> Result<Self, ArenaError> {
        config.validate()?;
        Ok(Self {
            slots: Vec::with_capacity(config.initial_capacity),
            free_list: Vec::new(),
            live: 0,
            config,
            stats: ArenaStats::default(),
        })
    }

    /// Store `fiber` in a new slot on [`Side::A`].
    pub fn allocate(&mut self, fiber: Fiber) -> Result<FiberRef, ArenaError> {
        if self.live >= self.config.max_instances {
            return Err(ArenaError::CapacityExceeded {
                max_instances: self.config.max_instances,
            });
        }
        let instance = if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.live = true;
            slot.buffers = [Some(fiber), None];
            self.stats.slot_reuses += 1;
            InstanceId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                live: true,
                buffers: [Some(fiber), None],
            });
            self.stats.slot_allocations += 1;
            InstanceId::new(index, 0)
        };
        self.live += 1;
        Ok(FiberRef::new(instance, Side::A))
    }

    fn slot(&self, instance: InstanceId) -> Result<&Slot, ArenaError> {
        match self.slots.get(instance.index() as usize) {
            Some(slot) if slot.live && slot.generation == instance.generation() => Ok(slot),
            _ => Err(ArenaError::StaleInstance { instance }),
        }
    }

    fn slot_mut(&mut self, instance: InstanceId) -> Result<&mut Slot, ArenaError> {
        match self.slots.get_mut(instance.index() as usize) {
            Some(slot) if slot.live && slot.generation == instance.generation() => Ok(slot),
            _ => Err(ArenaError::StaleInstance { instance }),
        }
    }

    /// Whether `instance` still occupies its slot.
    pub fn is_live(&self, instance: InstanceId) -> bool {
        self.slot(instance).is_ok()
    }

    /// Whether `fiber` resolves to a stored buffer.
    pub fn contains(&self, fiber: FiberRef) -> bool {
        self.get(fiber).is_ok()
    }

    /// Borrow a fiber buffer.
    pub fn get(&self, fiber: FiberRef) -> Result<&Fiber, ArenaError> {
        self.slot(fiber.instance())?.buffers[fiber.side().index()]
            .as_ref()
            .ok_or(ArenaError::MissingBuffer { fiber })
    }

    /// Mutably borrow a fiber buffer.
    pub fn get_mut(&mut self, fiber: FiberRef) -> Result<&mut Fiber, ArenaError> {
        self.slot_mut(fiber.instance())?.buffers[fiber.side().index()]
            .as_mut()
            .ok_or(ArenaError::MissingBuffer { fiber })
    }

    /// The other buffer of `fiber`'s slot, if it holds a fiber.
    pub fn alternate(&self, fiber: FiberRef) -> Option<FiberRef> {
        let other = fiber.flipped();
        self.contains(other).then_some(other)
    }

    /// Prepare the work-in-progress buffer for `current`.
    ///
    /// The other side of the slot is overwritten with a copy of
    /// `current` carrying `pending_props`, a cleared effect tag, and no
    /// host payload. Children, state, and the update queue are shared
    /// with `current` until written.
    pub fn create_work_in_progress(
        &mut self,
        current: FiberRef,
        pending_props: Props,
    ) -> Result<FiberRef, ArenaError> {
        let mut wip = self.get(current)?.clone();
        wip.pending_props = pending_props;
        wip.effect_tag = EffectTag::NO_EFFECT;
        wip.host_update = None;

        let target = current.flipped();
        let slot = self.slot_mut(current.instance())?;
        let previous = slot.buffers[target.side().index()].replace(wip);
        if previous.is_some() {
            self.stats.buffer_reuses += 1;
        } else {
            self.stats.buffer_allocations += 1;
        }
        Ok(target)
    }

    /// Apply `f` to every stored buffer of `instance`.
    pub fn for_each_buffer(
        &mut self,
        instance: InstanceId,
        mut f: impl FnMut(&mut Fiber),
    ) -> Result<(), ArenaError> {
        let slot = self.slot_mut(instance)?;
        for fiber in slot.buffers.iter_mut().flatten() {
            f(fiber);
        }
        Ok(())
    }

    /// Borrow whichever buffer of `instance` is stored, preferring
    /// [`Side::A`].
    pub fn any_buffer(&self, instance: InstanceId) -> Result<FiberRef, ArenaError> {
        let slot = self.slot(instance)?;
        let side = if slot.buffers[0].is_some() {
            Side::A
        } else {
            Side::B
        };
        let fiber = FiberRef::new(instance, side);
        if slot.buffers[side.index()].is_some() {
            Ok(fiber)
        } else {
            Err(ArenaError::MissingBuffer { fiber })
        }
    }

    /// Release `instance`'s slot. Outstanding references become stale.
    pub fn free(&mut self, instance: InstanceId) -> Result<(), ArenaError> {
        let slot = self.slot_mut(instance)?;
        slot.live = false;
        slot.buffers = [None, None];
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(instance.index());
        self.live -= 1;
        self.stats.frees += 1;
        Ok(())
    }

    /// First child of `fiber`.
    pub fn child_of(&self, fiber: FiberRef) -> Result<Option<FiberRef>, ArenaError> {
        Ok(self.get(fiber)?.child)
    }

    /// Next sibling of `fiber`.
    pub fn sibling_of(&self, fiber: FiberRef) -> Result<Option<FiberRef>, ArenaError> {
        Ok(self.get(fiber)?.sibling)
    }

    /// Parent of `fiber`.
    pub fn return_of(&self, fiber: FiberRef) -> Result<Option<FiberRef>, ArenaError> {
        Ok(self.get(fiber)?.return_fiber)
    }

    /// Point `fiber`'s parent link at `parent`.
    pub fn set_return(&mut self, fiber: FiberRef, parent: Option<FiberRef>) -> Result<(), ArenaError> {
        self.get_mut(fiber)?.return_fiber = parent;
        Ok(())
    }

    /// Direct children of `parent`, in sibling order.
    pub fn children(&self, parent: FiberRef) -> Result<SmallVec<[FiberRef; 8]>, ArenaError> {
        let mut out = SmallVec::new();
        let mut next = self.get(parent)?.child;
        while let Some(child) = next {
            out.push(child);
            next = self.get(child)?.sibling;
        }
        Ok(out)
    }

    /// Number of live instances.
    pub fn live_count(&self) -> usize {
        self.live as usize
    }

    /// Number of slots ever created, live or free.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Allocation counters since the last reset.
    pub fn stats(&self) -> ArenaStats {
        self.stats
    }

    /// Zero the allocation counters.
    pub fn reset_stats(&mut self) {
        self.stats = ArenaStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{HostHandle, RootId, WorkTag};

    fn arena() -> FiberArena {
        FiberArena::new(ArenaConfig::default()).unwrap()
    }

    fn leaf() -> Fiber {
        Fiber::new(WorkTag::HostText, None, Props::text("x"))
    }

    #[test]
    fn allocate_and_get() {
        let mut a = arena();
        let r = a.allocate(leaf()).unwrap();
        assert_eq!(r.side(), Side::A);
        assert_eq!(a.get(r).unwrap().text_content(), Some("x"));
        assert_eq!(a.live_count(), 1);
        assert!(a.alternate(r).is_none());
    }

    #[test]
    fn work_in_progress_lands_on_the_other_side() {
        let mut a = arena();
        let current = a.allocate(leaf()).unwrap();
        a.get_mut(current).unwrap().effect_tag = EffectTag::PLACEMENT;
        let wip = a.create_work_in_progress(current, Props::text("y")).unwrap();
        assert_eq!(wip, current.flipped());
        assert_eq!(a.alternate(wip), Some(current));
        assert_eq!(a.alternate(current), Some(wip));
        let f = a.get(wip).unwrap();
        assert_eq!(f.text_content(), Some("y"));
        assert!(f.effect_tag.is_empty());
        assert_eq!(a.stats().buffer_allocations, 1);

        a.create_work_in_progress(current, Props::text("z")).unwrap();
        assert_eq!(a.stats().buffer_reuses, 1);
    }

    #[test]
    fn update_queue_is_shared_until_written() {
        let mut a = arena();
        let root = a
            .allocate(Fiber::host_root(RootId(0), HostHandle(1)))
            .unwrap();
        let wip = a.create_work_in_progress(root, Props::empty()).unwrap();
        let q1 = a.get(root).unwrap().update_queue.clone().unwrap();
        let q2 = a.get(wip).unwrap().update_queue.clone().unwrap();
        assert!(std::sync::Arc::ptr_eq(&q1, &q2));
    }

    #[test]
    fn freed_slot_is_reused_with_new_generation() {
        let mut a = arena();
        let first = a.allocate(leaf()).unwrap();
        a.free(first.instance()).unwrap();
        assert!(!a.is_live(first.instance()));
        let second = a.allocate(leaf()).unwrap();
        assert_eq!(second.instance().index(), first.instance().index());
        assert_ne!(second.instance(), first.instance());
        match a.get(first) {
            Err(ArenaError::StaleInstance { .. }) => {}
            other => panic!("expected StaleInstance, got {other:?}"),
        }
        assert_eq!(a.stats().slot_reuses, 1);
    }

    #[test]
    fn double_free_is_rejected() {
        let mut a = arena();
        let r = a.allocate(leaf()).unwrap();
        a.free(r.instance()).unwrap();
        assert!(a.free(r.instance()).is_err());
    }

    #[test]
    fn capacity_ceiling_enforced() {
        let mut a = FiberArena::new(ArenaConfig {
            initial_capacity: 1,
            max_instances: 2,
        })
        .unwrap();
        a.allocate(leaf()).unwrap();
        a.allocate(leaf()).unwrap();
        match a.allocate(leaf()) {
            Err(ArenaError::CapacityExceeded { max_instances: 2 }) => {}
            other => panic!("expected CapacityExceeded, got {other:?}"),
        }
    }

    #[test]
    fn children_follow_sibling_links() {
        let mut a = arena();
        let parent = a
            .allocate(Fiber::new(WorkTag::Fragment, None, Props::empty()))
            .unwrap();
        let c1 = a.allocate(leaf()).unwrap();
        let c2 = a.allocate(leaf()).unwrap();
        a.get_mut(parent).unwrap().child = Some(c1);
        a.get_mut(c1).unwrap().sibling = Some(c2);
        let kids = a.children(parent).unwrap();
        assert_eq!(kids.as_slice(), &[c1, c2]);
    }

    #[test]
    fn for_each_buffer_touches_both_sides() {
        let mut a = arena();
        let r = a.allocate(leaf()).unwrap();
        a.create_work_in_progress(r, Props::text("w")).unwrap();
        let mut seen = 0;
        a.for_each_buffer(r.instance(), |f| {
            f.index = 9;
            seen += 1;
        })
        .unwrap();
        assert_eq!(seen, 2);
        assert_eq!(a.get(r.flipped()).unwrap().index, 9);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn live_count_matches_outstanding(ops in prop::collection::vec(any::<bool>(), 1..200)) {
                let mut a = arena();
                let mut live: Vec<InstanceId> = Vec::new();
                for alloc in ops {
                    if alloc || live.is_empty() {
                        live.push(a.allocate(leaf()).unwrap().instance());
                    } else {
                        let id = live.swap_remove(0);
                        a.free(id).unwrap();
                    }
                    prop_assert_eq!(a.live_count(), live.len());
                    for id in &live {
                        prop_assert!(a.is_live(*id));
                    }
                }
            }
        }
    }
}
