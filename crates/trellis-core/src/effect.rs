//! Side-effect bitset attached to each fiber.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Set of commit-phase operations a fiber needs.
///
/// Stored as a `u16` bitset. [`EffectTag::PERFORMED_WORK`] is bookkeeping
/// only; a fiber belongs in the effect list when its tag holds anything
/// beyond it (see [`EffectTag::has_side_effects`]).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EffectTag(u16);

impl EffectTag {
    /// Nothing to do.
    pub const NO_EFFECT: Self = Self(0);
    /// The component function ran during this render.
    pub const PERFORMED_WORK: Self = Self(1);
    /// Insert the node's host subtree into its host parent.
    pub const PLACEMENT: Self = Self(1 << 1);
    /// Apply a host property or text update.
    pub const UPDATE: Self = Self(1 << 2);
    /// Insert and then update.
    pub const PLACEMENT_AND_UPDATE: Self = Self((1 << 1) | (1 << 2));
    /// Remove the node's host subtree.
    pub const DELETION: Self = Self(1 << 3);
    /// Clear text content the host set directly on an element.
    pub const CONTENT_RESET: Self = Self(1 << 4);
    /// Invoke update callbacks after commit.
    pub const CALLBACK: Self = Self(1 << 5);
    /// A capture update was processed on this fiber.
    pub const DID_CAPTURE: Self = Self(1 << 6);
    /// Detach the old ref and attach the new one.
    pub const REF: Self = Self(1 << 7);

    const NAMES: [(Self, &'static str); 8] = [
        (Self::PERFORMED_WORK, "PerformedWork"),
        (Self::PLACEMENT, "Placement"),
        (Self::UPDATE, "Update"),
        (Self::DELETION, "Deletion"),
        (Self::CONTENT_RESET, "ContentReset"),
        (Self::CALLBACK, "Callback"),
        (Self::DID_CAPTURE, "DidCapture"),
        (Self::REF, "Ref"),
    ];

    /// Raw bit representation.
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Whether every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether any bit of `other` is set in `self`.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Set the bits of `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the bits of `other`.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Whether no bits are set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether the fiber needs work during commit.
    pub const fn has_side_effects(self) -> bool {
        self.0 > Self::PERFORMED_WORK.0
    }
}

impl BitOr for EffectTag {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for EffectTag {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for EffectTag {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for EffectTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NoEffect");
        }
        let mut first = true;
        for (flag, name) in Self::NAMES.iter() {
            if self.contains(*flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl fmt::Display for EffectTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
