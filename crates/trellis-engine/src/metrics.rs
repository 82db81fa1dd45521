//! Per-render performance counters.
//!
//! [`RenderMetrics`] captures the work done by one render-and-commit of
//! one root. The reconciler keeps the most recent record plus running
//! totals in [`ReconcilerTotals`].

use std::time::Duration;

/// Counters collected for a single committed render.
///
/// Durations are in microseconds and cover only the time spent inside
/// the engine, summed across time slices when the render yielded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderMetrics {
    /// Fibers that went through begin work.
    pub units_of_work: u32,
    /// Fibers allocated in fresh arena slots.
    pub fibers_created: u32,
    /// Existing fibers cloned into a work-in-progress buffer.
    pub fibers_cloned: u32,
    /// Fibers that skipped their own render.
    pub bailouts: u32,
    /// Times the render paused because the time slice ran out.
    pub yields: u32,
    /// Host insertions applied at commit.
    pub placements: u32,
    /// Host property and text updates applied at commit.
    pub updates: u32,
    /// Subtrees removed at commit.
    pub deletions: u32,
    /// Time spent rendering.
    pub render_us: u64,
    /// Time spent committing.
    pub commit_us: u64,
}

/// Running totals across the reconciler's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcilerTotals {
    /// Renders committed.
    pub commits: u64,
    /// In-progress renders discarded for a more urgent update.
    pub restarts: u64,
    /// Renders that ended in an error.
    pub render_failures: u64,
    /// Roots disabled after failures.
    pub disabled_roots: u64,
    /// Inbox messages accepted into the update queues.
    pub inbox_messages: u64,
}

/// Add `elapsed` to a microsecond counter, saturating at `u64::MAX`.
pub(crate) fn add_micros(total: &mut u64, elapsed: Duration) {
    let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
    *total = total.saturating_add(micros);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = RenderMetrics::default();
        assert_eq!(m.units_of_work, 0);
        assert_eq!(m.fibers_created, 0);
        assert_eq!(m.placements, 0);
        assert_eq!(m.render_us, 0);
        assert_eq!(ReconcilerTotals::default().commits, 0);
    }

    #[test]
    fn micro_counters_saturate() {
        let mut total = 5;
        add_micros(&mut total, Duration::from_micros(7));
        assert_eq!(total, 12);

        add_micros(&mut total, Duration::MAX);
        assert_eq!(total, u64::MAX);
        add_micros(&mut total, Duration::from_micros(1));
        assert_eq!(total, u64::MAX);
    }
}
