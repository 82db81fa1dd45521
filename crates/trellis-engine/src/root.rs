//! Root records: one per mounted container.

use trellis_arena::FiberRef;
use trellis_core::{ExpirationTime, HostHandle, RootId, ValueMap};

use crate::session::FinishedWork;

/// Options fixed when a root is created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RootOptions {
    /// Render updates asynchronously by priority. When `false` every
    /// update is synchronous.
    pub concurrent: bool,
}

impl RootOptions {
    /// Every update renders and commits synchronously.
    pub const LEGACY: Self = Self { concurrent: false };
    /// Updates are bucketed by priority and rendered in time slices.
    pub const CONCURRENT: Self = Self { concurrent: true };
}

pub(crate) struct Root {
    pub(crate) id: RootId,
    pub(crate) container: HostHandle,
    pub(crate) options: RootOptions,
    pub(crate) current: FiberRef,
    pub(crate) finished_work: Option<FinishedWork>,

    /// Most and least urgent levels with uncommitted updates.
    pub(crate) earliest_pending: ExpirationTime,
    pub(crate) latest_pending: ExpirationTime,
    /// Level the root is queued for. `NO_WORK` when it is not queued,
    /// including after a render failure.
    pub(crate) scheduled: ExpirationTime,

    pub(crate) context: Option<ValueMap>,
    pub(crate) pending_context: Option<ValueMap>,

    pub(crate) consecutive_failures: u32,
    pub(crate) disabled: bool,
}

impl Root {
    pub(crate) fn new(id: RootId, container: HostHandle, options: RootOptions, current: FiberRef) -> Self {
        Self {
            id,
            container,
            options,
            current,
            finished_work: None,
            earliest_pending: ExpirationTime::NO_WORK,
            latest_pending: ExpirationTime::NO_WORK,
            scheduled: ExpirationTime::NO_WORK,
            context: None,
            pending_context: None,
            consecutive_failures: 0,
            disabled: false,
        }
    }

    /// The level the next render of this root should use.
    pub(crate) fn next_expiration(&self) -> ExpirationTime {
        self.earliest_pending
    }

    /// Record an update at `expiration`.
    pub(crate) fn mark_pending(&mut self, expiration: ExpirationTime) {
        if self.earliest_pending.is_no_work() {
            self.earliest_pending = expiration;
            self.latest_pending = expiration;
        } else if self.earliest_pending < expiration {
            self.earliest_pending = expiration;
        } else if self.latest_pending > expiration {
            self.latest_pending = expiration;
        }
    }

    /// Narrow the pending range after a commit left `remaining` as the
    /// most urgent outstanding work.
    pub(crate) fn mark_committed(&mut self, remaining: ExpirationTime) {
        if remaining.is_no_work() {
            self.earliest_pending = ExpirationTime::NO_WORK;
            self.latest_pending = ExpirationTime::NO_WORK;
            return;
        }
        if !self.latest_pending.is_no_work() {
            if self.latest_pending > remaining {
                // Everything that was pending got committed.
                self.earliest_pending = ExpirationTime::NO_WORK;
                self.latest_pending = ExpirationTime::NO_WORK;
            } else if self.earliest_pending > remaining {
                self.earliest_pending = self.latest_pending;
            }
        }
        self.mark_pending(remaining);
    }

    pub(crate) fn is_scheduled(&self) -> bool {
        !self.disabled && !self.scheduled.is_no_work()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_arena::Side;
    use trellis_core::InstanceId;

    fn root() -> Root {
        Root::new(
            RootId(0),
            HostHandle(1),
            RootOptions::CONCURRENT,
            FiberRef::new(InstanceId::new(0, 0), Side::A),
        )
    }

    fn e(raw: u32) -> ExpirationTime {
        ExpirationTime::from_raw(raw)
    }

    #[test]
    fn pending_range_widens() {
        let mut r = root();
        r.mark_pending(e(100));
        r.mark_pending(e(300));
        r.mark_pending(e(50));
        assert_eq!(r.earliest_pending, e(300));
        assert_eq!(r.latest_pending, e(50));
        assert_eq!(r.next_expiration(), e(300));
    }

    #[test]
    fn committing_everything_clears_the_range() {
        let mut r = root();
        r.mark_pending(e(100));
        r.mark_committed(ExpirationTime::NO_WORK);
        assert!(r.next_expiration().is_no_work());
    }

    #[test]
    fn committing_urgent_level_leaves_lower() {
        let mut r = root();
        r.mark_pending(e(100));
        r.mark_pending(e(300));
        r.mark_committed(e(100));
        assert_eq!(r.earliest_pending, e(100));
        assert_eq!(r.latest_pending, e(100));
    }

    #[test]
    fn new_remaining_work_is_tracked() {
        let mut r = root();
        r.mark_pending(e(300));
        // A commit at 300 that left new work at 200.
        r.mark_committed(e(200));
        assert_eq!(r.next_expiration(), e(200));
    }
}
