//! Strongly-typed identifiers.

use std::fmt;

/// Stable identity of a logical tree node across renders.
///
/// An instance occupies one arena slot for its whole mounted lifetime.
/// Both of its fiber buffers (current and work-in-progress) share the
/// same `InstanceId`, so a reused node keeps its identity from one
/// commit to the next. The generation distinguishes a freed slot from
/// the instance that later reuses it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId {
    index: u32,
    generation: u32,
}

impl InstanceId {
    /// Build an identifier from a slot index and generation.
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index within the fiber arena.
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot at the time this instance was allocated.
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Identifies a root container managed by a reconciler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootId(pub u32);

impl fmt::Display for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root{}", self.0)
    }
}

impl From<u32> for RootId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Opaque handle to a node owned by the host environment.
///
/// The engine never interprets the value; it only hands it back to the
/// [`HostConfig`](crate::HostConfig) that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostHandle(pub u64);

impl fmt::Display for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

impl From<u64> for HostHandle {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Identifies a callback registered with a [`Scheduler`](crate::Scheduler).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_id_display_includes_generation() {
        assert_eq!(InstanceId::new(7, 2).to_string(), "#7v2");
    }

    #[test]
    fn instance_ids_differ_by_generation() {
        let a = InstanceId::new(3, 0);
        let b = InstanceId::new(3, 1);
        assert_ne!(a, b);
        assert_eq!(a.index(), b.index());
    }
}
