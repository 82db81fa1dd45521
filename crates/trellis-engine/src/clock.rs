//! The priority clock: wall time to expiration times.

use trellis_core::{ExpirationTime, PriorityLevel};

use crate::config::ReconcilerConfig;

/// Converts scheduler time into [`ExpirationTime`]s.
///
/// Two readings are cached. The renderer time tracks the clock and
/// decides whether a render has expired. The scheduler time is what new
/// updates are stamped with; while work is pending or a render is in
/// progress it is held, so every update issued in one burst computes its
/// deadline from the same instant and lands in the same bucket.
#[derive(Clone, Debug)]
pub struct PriorityClock {
    origin_ms: u64,
    renderer_time: ExpirationTime,
    scheduler_time: ExpirationTime,
}

impl PriorityClock {
    /// A clock whose zero is the scheduler reading `origin_ms`.
    pub fn new(origin_ms: u64) -> Self {
        let start = ExpirationTime::from_ms(0);
        Self {
            origin_ms,
            renderer_time: start,
            scheduler_time: start,
        }
    }

    /// Re-read the renderer time from the scheduler reading `now_ms`.
    pub fn recompute(&mut self, now_ms: u64) -> ExpirationTime {
        self.renderer_time = ExpirationTime::from_ms(now_ms.saturating_sub(self.origin_ms));
        self.renderer_time
    }

    /// The cached renderer time.
    pub fn now(&self) -> ExpirationTime {
        self.renderer_time
    }

    /// The time new updates should be stamped with.
    ///
    /// When `hold` is set the previous reading is returned unchanged.
    pub fn request_current_time(&mut self, now_ms: u64, hold: bool) -> ExpirationTime {
        if !hold {
            self.scheduler_time = self.recompute(now_ms);
        }
        self.scheduler_time
    }

    /// Deadline for an update issued at `current` with `priority`.
    pub fn expiration_for(
        &self,
        current: ExpirationTime,
        priority: PriorityLevel,
        config: &ReconcilerConfig,
    ) -> ExpirationTime {
        match priority {
            PriorityLevel::Immediate => ExpirationTime::SYNC,
            PriorityLevel::UserBlocking => ExpirationTime::bucket(
                current,
                config.interactive_expiration_ms,
                config.interactive_bucket_ms,
            ),
            PriorityLevel::Normal | PriorityLevel::Low => {
                ExpirationTime::bucket(current, config.async_expiration_ms, config.async_bucket_ms)
            }
            PriorityLevel::Idle => ExpirationTime::NEVER,
        }
    }

    /// Milliseconds from now until `expiration` passes, for scheduler
    /// timeouts. `None` for [`ExpirationTime::NEVER`].
    pub fn timeout_ms(&self, expiration: ExpirationTime) -> Option<u64> {
        if expiration <= ExpirationTime::NEVER {
            return None;
        }
        if expiration == ExpirationTime::SYNC {
            return Some(0);
        }
        Some(expiration.to_ms().saturating_sub(self.renderer_time.to_ms()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_time_does_not_advance() {
        let mut clock = PriorityClock::new(1_000);
        let first = clock.request_current_time(1_000, false);
        let held = clock.request_current_time(9_000, true);
        assert_eq!(first, held);
        let fresh = clock.request_current_time(9_000, false);
        assert!(fresh < first);
    }

    #[test]
    fn priorities_order_by_urgency() {
        let clock = PriorityClock::new(0);
        let cfg = ReconcilerConfig::default();
        let now = clock.now();
        let sync = clock.expiration_for(now, PriorityLevel::Immediate, &cfg);
        let interactive = clock.expiration_for(now, PriorityLevel::UserBlocking, &cfg);
        let normal = clock.expiration_for(now, PriorityLevel::Normal, &cfg);
        let idle = clock.expiration_for(now, PriorityLevel::Idle, &cfg);
        assert!(sync > interactive);
        assert!(interactive > normal);
        assert!(normal > idle);
        assert_eq!(idle, ExpirationTime::NEVER);
    }

    #[test]
    fn timeout_counts_down() {
        let mut clock = PriorityClock::new(0);
        let cfg = ReconcilerConfig::default();
        let normal = clock.expiration_for(clock.now(), PriorityLevel::Normal, &cfg);
        let at_start = clock.timeout_ms(normal).unwrap();
        clock.recompute(1_000);
        let later = clock.timeout_ms(normal).unwrap();
        assert_eq!(at_start - later, 1_000);
        assert_eq!(clock.timeout_ms(ExpirationTime::NEVER), None);
    }
}
