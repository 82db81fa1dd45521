//! Expiration times and priority levels.
//!
//! An [`ExpirationTime`] is a coarse-grained deadline. Larger values are
//! more urgent: [`ExpirationTime::SYNC`] outranks every computed deadline,
//! [`ExpirationTime::NEVER`] is the lowest real priority, and
//! [`ExpirationTime::NO_WORK`] means nothing is pending at all.
//!
//! Wall-clock milliseconds map onto the scale in 10 ms units counted
//! down from a fixed offset, so an earlier deadline is a larger number.
//! Deadlines are then rounded into buckets, which makes updates issued
//! close together share one expiration time and render in one pass.

use std::fmt;

const MAX_SIGNED_31_BIT_INT: u32 = 1_073_741_823;
const MAGIC_NUMBER_OFFSET: u32 = MAX_SIGNED_31_BIT_INT - 1;

/// Milliseconds per expiration unit.
pub const UNIT_SIZE_MS: u64 = 10;

/// A coarse deadline; larger values are more urgent.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ExpirationTime(u32);

impl ExpirationTime {
    /// No pending work.
    pub const NO_WORK: Self = Self(0);
    /// Lowest real priority: work that never times out.
    pub const NEVER: Self = Self(1);
    /// Highest priority: work that must complete without yielding.
    pub const SYNC: Self = Self(MAX_SIGNED_31_BIT_INT);

    /// Wrap a raw expiration value.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw expiration value.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether this is [`ExpirationTime::NO_WORK`].
    pub const fn is_no_work(self) -> bool {
        self.0 == 0
    }

    /// Convert elapsed milliseconds into an expiration time.
    ///
    /// Times far enough in the future saturate just above
    /// [`ExpirationTime::NEVER`] so they never collide with the
    /// sentinel values.
    pub fn from_ms(ms: u64) -> Self {
        let units = ms / UNIT_SIZE_MS;
        let offset = u64::from(MAGIC_NUMBER_OFFSET);
        let raw = offset.saturating_sub(units).max(2);
        Self(raw as u32)
    }

    /// Convert back to elapsed milliseconds.
    ///
    /// Only meaningful for computed deadlines; sentinels map to zero.
    pub fn to_ms(self) -> u64 {
        u64::from(MAGIC_NUMBER_OFFSET.saturating_sub(self.0)) * UNIT_SIZE_MS
    }

    /// Round `expiration_ms` past `current` up to the next bucket of
    /// `bucket_size_ms`.
    ///
    /// All `current` values falling inside one bucket window produce the
    /// same result.
    pub fn bucket(current: Self, expiration_ms: u64, bucket_size_ms: u64) -> Self {
        let offset = u64::from(MAGIC_NUMBER_OFFSET);
        let precision = (bucket_size_ms / UNIT_SIZE_MS).max(1);
        let num = offset.saturating_sub(u64::from(current.0)) + expiration_ms / UNIT_SIZE_MS;
        let rounded = (num / precision + 1) * precision;
        Self(offset.saturating_sub(rounded).max(2) as u32)
    }

    /// The more urgent of two expiration times.
    pub fn most_urgent(self, other: Self) -> Self {
        self.max(other)
    }

    /// Whether work at this level is due when rendering at `render`.
    pub fn covers(self, render: Self) -> bool {
        !self.is_no_work() && self >= render
    }
}

impl fmt::Debug for ExpirationTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NO_WORK => write!(f, "NoWork"),
            Self::NEVER => write!(f, "Never"),
            Self::SYNC => write!(f, "Sync"),
            Self(raw) => write!(f, "Expiration({raw})"),
        }
    }
}

impl fmt::Display for ExpirationTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How urgently an update should be applied.
///
/// The caller picks a level; the engine turns it into an
/// [`ExpirationTime`] using the current clock and the bucket settings in
/// its configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PriorityLevel {
    /// Applied synchronously, never yields.
    Immediate,
    /// Direct user input; short deadline.
    UserBlocking,
    /// Ordinary updates; long deadline.
    Normal,
    /// Deferred updates; same deadline class as [`PriorityLevel::Normal`].
    Low,
    /// Work that runs only when nothing else is pending.
    Idle,
}

impl PriorityLevel {
    /// Infer a scheduler priority from an expiration time.
    ///
    /// `current` is the clock reading the deadline is measured against.
    /// `interactive_ms` bounds how soon a deadline must be to count as
    /// user-blocking.
    pub fn from_expiration(expiration: ExpirationTime, current: ExpirationTime, interactive_ms: u64) -> Self {
        if expiration == ExpirationTime::SYNC {
            return Self::Immediate;
        }
        if expiration == ExpirationTime::NEVER || expiration.is_no_work() {
            return Self::Idle;
        }
        let remaining = expiration.to_ms().saturating_sub(current.to_ms());
        if remaining == 0 {
            Self::Immediate
        } else if remaining <= interactive_ms {
            Self::UserBlocking
        } else {
            Self::Normal
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Immediate => "immediate",
            Self::UserBlocking => "user-blocking",
            Self::Normal => "normal",
            Self::Low => "low",
            Self::Idle => "idle",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_are_ordered_by_urgency() {
        assert!(ExpirationTime::SYNC > ExpirationTime::from_ms(0));
        assert!(ExpirationTime::from_ms(0) > ExpirationTime::NEVER);
        assert!(ExpirationTime::NEVER > ExpirationTime::NO_WORK);
    }

    #[test]
    fn later_times_are_less_urgent() {
        assert!(ExpirationTime::from_ms(100) < ExpirationTime::from_ms(50));
    }

    #[test]
    fn ms_round_trip_at_unit_granularity() {
        assert_eq!(ExpirationTime::from_ms(1230).to_ms(), 1230);
        assert_eq!(ExpirationTime::from_ms(1239).to_ms(), 1230);
    }

    #[test]
    fn bucket_coalesces_nearby_times() {
        let a = ExpirationTime::bucket(ExpirationTime::from_ms(0), 5000, 250);
        let b = ExpirationTime::bucket(ExpirationTime::from_ms(100), 5000, 250);
        let c = ExpirationTime::bucket(ExpirationTime::from_ms(240), 5000, 250);
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn bucket_boundary_moves_to_next_bucket() {
        let a = ExpirationTime::bucket(ExpirationTime::from_ms(0), 5000, 250);
        let b = ExpirationTime::bucket(ExpirationTime::from_ms(250), 5000, 250);
        assert!(b < a);
    }

    #[test]
    fn shorter_deadline_is_more_urgent() {
        let now = ExpirationTime::from_ms(1000);
        let interactive = ExpirationTime::bucket(now, 150, 100);
        let normal = ExpirationTime::bucket(now, 5000, 250);
        assert!(interactive > normal);
        assert!(interactive < ExpirationTime::SYNC);
    }

    #[test]
    fn covers_ignores_no_work() {
        assert!(!ExpirationTime::NO_WORK.covers(ExpirationTime::NO_WORK));
        assert!(ExpirationTime::SYNC.covers(ExpirationTime::SYNC));
        assert!(!ExpirationTime::NEVER.covers(ExpirationTime::SYNC));
    }

    #[test]
    fn priority_inference() {
        let now = ExpirationTime::from_ms(0);
        assert_eq!(
            PriorityLevel::from_expiration(ExpirationTime::SYNC, now, 150),
            PriorityLevel::Immediate
        );
        assert_eq!(
            PriorityLevel::from_expiration(ExpirationTime::NEVER, now, 150),
            PriorityLevel::Idle
        );
        let soon = ExpirationTime::bucket(now, 50, 10);
        assert_eq!(
            PriorityLevel::from_expiration(soon, now, 150),
            PriorityLevel::UserBlocking
        );
        let later = ExpirationTime::bucket(now, 5000, 250);
        assert_eq!(
            PriorityLevel::from_expiration(later, now, 150),
            PriorityLevel::Normal
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn bucket_is_monotonic_in_time(a in 0u64..10_000_000, delta in 0u64..1_000_000) {
                let early = ExpirationTime::bucket(ExpirationTime::from_ms(a), 5000, 250);
                let late = ExpirationTime::bucket(ExpirationTime::from_ms(a + delta), 5000, 250);
                prop_assert!(late <= early);
            }

            #[test]
            fn bucket_never_hits_sentinels(a in 0u64..u64::from(u32::MAX) * 10) {
                let e = ExpirationTime::bucket(ExpirationTime::from_ms(a), 5000, 250);
                prop_assert!(e > ExpirationTime::NEVER);
                prop_assert!(e < ExpirationTime::SYNC);
            }
        }
    }
}
