//! The cooperative scheduler interface.

use crate::expiration::PriorityLevel;
use crate::id::TaskId;

/// Time source and callback queue the engine renders against.
///
/// The engine never spawns threads or timers. When it has deferred work
/// it asks the scheduler for a callback; when that callback fires, the
/// driver calls `Reconciler::perform_async_work`. During a yieldable
/// render the engine polls [`Scheduler::should_yield`] between units of
/// work and stops as soon as it returns `true`.
pub trait Scheduler {
    /// Milliseconds elapsed on a monotonic clock.
    fn now_ms(&self) -> u64;

    /// Whether the current time slice is used up.
    fn should_yield(&mut self) -> bool;

    /// Ask to be called back. `timeout_ms` is how long the work may wait
    /// before it must run regardless of other activity.
    fn schedule_callback(&mut self, priority: PriorityLevel, timeout_ms: Option<u64>) -> TaskId;

    /// Withdraw a callback that has not fired yet.
    fn cancel_callback(&mut self, task: TaskId);
}
