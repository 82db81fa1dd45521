//! The unit-of-work loop.
//!
//! A render is a depth-first walk over the work-in-progress tree. Each
//! step begins one fiber, descending into its first child; a fiber with
//! no child is completed, and completion climbs through siblings and
//! parents until it finds the next fiber to begin.
//!
//! In yieldy mode the scheduler is asked before every step whether the
//! time slice is over. The walk can stop between any two steps and
//! resume later from [`RenderSession::next_unit`].

use std::time::Instant;

use tracing::{debug, trace};
use trellis_arena::{FiberArena, FiberRef};
use trellis_core::{HostConfig, Scheduler};

use crate::begin_work::begin_work;
use crate::complete_work::complete_unit_of_work;
use crate::error::RenderError;
use crate::metrics::add_micros;
use crate::session::RenderSession;

/// Borrowed state for one render step.
pub(crate) struct RenderCx<'a> {
    pub(crate) arena: &'a mut FiberArena,
    pub(crate) host: &'a mut dyn HostConfig,
    pub(crate) session: &'a mut RenderSession,
}

/// How a call to [`work_loop`] ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LoopStatus {
    /// The slice ran out; the session holds the next unit.
    Yielded,
    /// The tree is complete and ready to commit.
    Completed,
}

/// Run units of work until the tree completes or, when `yieldy`, the
/// scheduler asks to yield.
pub(crate) fn work_loop(
    cx: &mut RenderCx<'_>,
    scheduler: &mut dyn Scheduler,
    yieldy: bool,
) -> Result<LoopStatus, RenderError> {
    let started = Instant::now();
    let status = run(cx, scheduler, yieldy);
    add_micros(&mut cx.session.metrics.render_us, started.elapsed());
    status
}

fn run(
    cx: &mut RenderCx<'_>,
    scheduler: &mut dyn Scheduler,
    yieldy: bool,
) -> Result<LoopStatus, RenderError> {
    while let Some(unit) = cx.session.next_unit {
        if yieldy && scheduler.should_yield() {
            cx.session.metrics.yields += 1;
            debug!(
                root = %cx.session.root,
                next = %unit,
                units = cx.session.metrics.units_of_work,
                "render yielded"
            );
            return Ok(LoopStatus::Yielded);
        }
        cx.session.next_unit = perform_unit_of_work(cx, unit)?;
    }
    Ok(LoopStatus::Completed)
}

/// Begin `unit`; complete it when it has no child to descend into.
pub(crate) fn perform_unit_of_work(
    cx: &mut RenderCx<'_>,
    unit: FiberRef,
) -> Result<Option<FiberRef>, RenderError> {
    let current = cx.arena.alternate(unit);
    trace!(fiber = %unit, "begin");
    let next = begin_work(cx, current, unit)?;
    {
        let fiber = cx.arena.get_mut(unit)?;
        fiber.memoized_props = Some(fiber.pending_props.clone());
    }
    cx.session.metrics.units_of_work += 1;
    match next {
        Some(child) => Ok(Some(child)),
        None => complete_unit_of_work(cx, unit),
    }
}
