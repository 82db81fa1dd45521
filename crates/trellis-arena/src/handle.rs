//! References into the fiber arena.

use std::fmt;

use trellis_core::InstanceId;

/// Which of a slot's two buffers a reference points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// First buffer.
    A,
    /// Second buffer.
    B,
}

impl Side {
    /// The other buffer.
    pub const fn flip(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

/// Reference to one fiber buffer: a generation-checked slot plus a side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FiberRef {
    instance: InstanceId,
    side: Side,
}

impl FiberRef {
    /// Build a reference.
    pub const fn new(instance: InstanceId, side: Side) -> Self {
        Self { instance, side }
    }

    /// The logical instance this buffer belongs to.
    pub const fn instance(self) -> InstanceId {
        self.instance
    }

    /// Which buffer.
    pub const fn side(self) -> Side {
        self.side
    }

    /// Reference to the other buffer of the same slot.
    pub const fn flipped(self) -> Self {
        Self {
            instance: self.instance,
            side: self.side.flip(),
        }
    }
}

impl fmt::Display for FiberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:?}", self.instance, self.side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flipped_twice_is_identity() {
        let r = FiberRef::new(InstanceId::new(4, 1), Side::A);
        assert_eq!(r.flipped().side(), Side::B);
        assert_eq!(r.flipped().flipped(), r);
        assert_eq!(r.flipped().instance(), r.instance());
    }

    #[test]
    fn display_shows_side() {
        let r = FiberRef::new(InstanceId::new(2, 0), Side::B);
        assert_eq!(r.to_string(), "#2v0/B");
    }
}
