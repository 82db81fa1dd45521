//! The reconciler: roots, scheduling, and the render/commit driver.
//!
//! # Scheduling model
//!
//! Every update gets an [`ExpirationTime`]. Legacy roots and updates
//! issued during a commit are synchronous and render before the call
//! that scheduled them returns. Concurrent-root updates are bucketed by
//! priority and rendered when the host calls
//! [`Reconciler::perform_async_work`] in response to the task the
//! reconciler asked its [`Scheduler`] for.
//!
//! Only one render is in flight at a time. An update more urgent than
//! the in-flight render discards it; the next slice restarts from the
//! committed tree. A render that fails is discarded the same way and the
//! root stops being scheduled until it receives a new update; after
//! [`ReconcilerConfig::max_consecutive_failures`] failures in a row the
//! root is disabled. A failed commit disables the root at once, because
//! the host may have been partially mutated.

use indexmap::IndexMap;
use tracing::{debug, error, warn};
use trellis_arena::{ArenaStats, Fiber, FiberArena, StateNode};
use trellis_core::{
    value_map, Callback, ExpirationTime, HostConfig, HostHandle, InstanceId, Node, PriorityLevel,
    RootId, Scheduler, TaskId, Update, Value, ValueMap, WorkTag,
};

use crate::clock::PriorityClock;
use crate::commit::{self, CommitCx};
use crate::config::{ConfigError, ReconcilerConfig};
use crate::error::{ReconcileError, RenderError, ScheduleError};
use crate::inbox::{Inbox, InboxMessage, UpdateSender};
use crate::inspect::{EffectSummary, TreeSnapshot};
use crate::metrics::{ReconcilerTotals, RenderMetrics};
use crate::root::{Root, RootOptions};
use crate::session::{FinishedWork, RenderSession};
use crate::update_queue::{self, ROOT_ELEMENT_KEY};
use crate::work_loop::{work_loop, LoopStatus, RenderCx};

/// Whether work remains after a call to
/// [`Reconciler::perform_async_work`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkStatus {
    /// Nothing is scheduled.
    Idle,
    /// Work remains at this level; a scheduler task has been requested.
    Pending(ExpirationTime),
}

/// Incremental tree reconciler over a host `H` and scheduler `S`.
pub struct Reconciler<H: HostConfig, S: Scheduler> {
    host: H,
    scheduler: S,
    arena: FiberArena,
    config: ReconcilerConfig,
    clock: PriorityClock,
    roots: IndexMap<RootId, Root>,
    next_root_id: u32,
    session: Option<RenderSession>,
    /// Outstanding scheduler task and the level it was requested for.
    callback: Option<(TaskId, ExpirationTime)>,
    is_performing: bool,
    is_committing: bool,
    is_batching: bool,
    did_yield: bool,
    inbox: Inbox,
    last_metrics: Option<RenderMetrics>,
    totals: ReconcilerTotals,
}

impl<H: HostConfig, S: Scheduler> Reconciler<H, S> {
    /// Validate `config` and build a reconciler with no roots.
    pub fn new(host: H, scheduler: S, config: ReconcilerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let arena = FiberArena::new(config.arena.clone())?;
        let clock = PriorityClock::new(scheduler.now_ms());
        let inbox = Inbox::new(config.inbox_capacity);
        Ok(Self {
            host,
            scheduler,
            arena,
            config,
            clock,
            roots: IndexMap::new(),
            next_root_id: 0,
            session: None,
            callback: None,
            is_performing: false,
            is_committing: false,
            is_batching: false,
            did_yield: false,
            inbox,
            last_metrics: None,
            totals: ReconcilerTotals::default(),
        })
    }

    // ── Roots ───────────────────────────────────────────────────

    /// Create a root rendering into `container`.
    pub fn create_root(
        &mut self,
        container: HostHandle,
        options: RootOptions,
    ) -> Result<RootId, ReconcileError> {
        let id = RootId(self.next_root_id);
        let current = self.arena.allocate(Fiber::host_root(id, container))?;
        self.next_root_id += 1;
        self.roots.insert(id, Root::new(id, container, options, current));
        debug!(root = %id, %container, concurrent = options.concurrent, "root created");
        Ok(id)
    }

    /// Render nothing into `root`, then release it and all its fibers.
    ///
    /// A disabled root is released without touching the host.
    pub fn unmount(&mut self, root: RootId) -> Result<(), ReconcileError> {
        let disabled = self.root(root)?.disabled;
        if !disabled {
            self.schedule_update_with_priority(root, Node::Empty, PriorityLevel::Immediate, None)?;
            self.perform_sync_work()?;
        }
        if self.session.as_ref().is_some_and(|s| s.root == root) {
            self.discard_session();
        }
        let record = self
            .roots
            .shift_remove(&root)
            .ok_or(ScheduleError::UnknownRoot { root })?;
        for fiber in commit::collect_subtree(&self.arena, record.current)? {
            self.arena.free(fiber.instance())?;
        }
        debug!(%root, live = self.arena.live_count(), "root unmounted");
        Ok(())
    }

    /// The container handle `root` renders into.
    pub fn container(&self, root: RootId) -> Result<HostHandle, ReconcileError> {
        Ok(self.root(root)?.container)
    }

    /// Whether `root` has been disabled by failures.
    pub fn is_disabled(&self, root: RootId) -> Result<bool, ReconcileError> {
        Ok(self.root(root)?.disabled)
    }

    /// Set the context visible to every component of `root`. It applies
    /// from the next render, which re-renders every component.
    pub fn set_root_context(&mut self, root: RootId, context: ValueMap) -> Result<(), ReconcileError> {
        self.live_root_mut(root)?.pending_context = Some(context);
        Ok(())
    }

    // ── Updates ─────────────────────────────────────────────────

    /// Ask `root` to display `element` at normal priority.
    ///
    /// Returns the expiration the update was scheduled at. On a legacy
    /// root the update has been committed by the time this returns.
    pub fn schedule_update(
        &mut self,
        root: RootId,
        element: impl Into<Node>,
        callback: Option<Callback>,
    ) -> Result<ExpirationTime, ReconcileError> {
        self.schedule_update_with_priority(root, element, PriorityLevel::Normal, callback)
    }

    /// Ask `root` to display `element` at `priority`. `callback` runs
    /// once the update is committed.
    pub fn schedule_update_with_priority(
        &mut self,
        root: RootId,
        element: impl Into<Node>,
        priority: PriorityLevel,
        callback: Option<Callback>,
    ) -> Result<ExpirationTime, ReconcileError> {
        let (current, options) = {
            let record = self.live_root(root)?;
            (record.current, record.options)
        };
        let expiration = self.compute_expiration(priority, options);
        let mut update = Update::merge(value_map([(ROOT_ELEMENT_KEY, Value::Node(element.into()))]));
        update.expiration_time = expiration;
        update.callback = callback;
        update_queue::enqueue_update(&mut self.arena, current.instance(), update)?;
        debug!(%root, %priority, ?expiration, "root update scheduled");
        self.schedule_work(current.instance(), expiration)?;
        Ok(expiration)
    }

    /// Queue a state update on a stateful instance (a component or a
    /// root).
    pub fn enqueue_update(
        &mut self,
        instance: InstanceId,
        mut update: Update,
        priority: PriorityLevel,
    ) -> Result<ExpirationTime, ReconcileError> {
        if !self.arena.is_live(instance) {
            return Err(ScheduleError::StaleInstance { instance }.into());
        }
        let tag = self.arena.get(self.arena.any_buffer(instance)?)?.tag;
        if !tag.is_stateful() {
            return Err(ScheduleError::NotStateful { instance, tag }.into());
        }
        let root = self.find_root_of(instance)?;
        let options = self.live_root(root)?.options;
        let expiration = self.compute_expiration(priority, options);
        update.expiration_time = expiration;
        update_queue::enqueue_update(&mut self.arena, instance, update)?;
        debug!(%instance, %priority, ?expiration, "state update scheduled");
        self.schedule_work(instance, expiration)?;
        Ok(expiration)
    }

    /// Run `f` with synchronous work deferred, then flush it.
    pub fn batched_updates<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> Result<R, ReconcileError> {
        let previous = std::mem::replace(&mut self.is_batching, true);
        let out = f(self);
        self.is_batching = previous;
        if !previous {
            self.perform_sync_work()?;
        }
        Ok(out)
    }

    /// A handle for submitting updates from other threads or from commit
    /// callbacks.
    pub fn update_sender(&self) -> UpdateSender {
        self.inbox.sender()
    }

    // ── Driving work ────────────────────────────────────────────

    /// Render and commit all synchronous work.
    pub fn perform_sync_work(&mut self) -> Result<(), ReconcileError> {
        self.perform_work(ExpirationTime::SYNC, false)
    }

    /// Render pending work in a time slice, highest priority first.
    ///
    /// Call this when the scheduler runs the task the reconciler
    /// requested. Work stops when the scheduler asks to yield, unless it
    /// has expired.
    pub fn perform_async_work(&mut self) -> Result<WorkStatus, ReconcileError> {
        self.callback = None;
        self.perform_work(ExpirationTime::NEVER, true)?;
        Ok(self.work_status())
    }

    /// Render `root`'s next pending level to completion without
    /// committing, and return the resulting effect list. `None` when the
    /// root has no pending work.
    pub fn prepare_root(&mut self, root: RootId) -> Result<Option<EffectSummary>, ReconcileError> {
        let (has_finished, expiration) = {
            let record = self.live_root(root)?;
            (record.finished_work.is_some(), record.next_expiration())
        };
        if !has_finished {
            if expiration.is_no_work() {
                return Ok(None);
            }
            let previous = std::mem::replace(&mut self.is_performing, true);
            let result = self.render_root(root, expiration, false);
            self.is_performing = previous;
            result?;
        }
        self.finished_effects(root)
    }

    /// Commit `root`'s finished tree. Returns `false` when there is none.
    pub fn commit_root(&mut self, root: RootId) -> Result<bool, ReconcileError> {
        if self.live_root(root)?.finished_work.is_none() {
            return Ok(false);
        }
        let previous = std::mem::replace(&mut self.is_performing, true);
        let result = self.complete_root(root);
        self.is_performing = previous;
        result?;
        self.schedule_remaining();
        Ok(true)
    }

    /// Whether any root has scheduled work.
    pub fn has_pending_work(&self) -> bool {
        self.find_highest_priority_root().is_some()
    }

    /// The most urgent scheduled root and its level.
    pub fn next_scheduled(&self) -> Option<(RootId, ExpirationTime)> {
        self.find_highest_priority_root()
    }

    // ── Inspection ──────────────────────────────────────────────

    /// Snapshot of `root`'s committed tree.
    pub fn current_tree(&self, root: RootId) -> Result<TreeSnapshot, ReconcileError> {
        Ok(TreeSnapshot::capture(&self.arena, self.root(root)?.current)?)
    }

    /// Snapshot of `root`'s finished but uncommitted tree.
    pub fn finished_tree(&self, root: RootId) -> Result<Option<TreeSnapshot>, ReconcileError> {
        match &self.root(root)?.finished_work {
            Some(finished) => Ok(Some(TreeSnapshot::capture(&self.arena, finished.fiber)?)),
            None => Ok(None),
        }
    }

    /// Effect list of `root`'s finished but uncommitted tree.
    pub fn finished_effects(&self, root: RootId) -> Result<Option<EffectSummary>, ReconcileError> {
        match &self.root(root)?.finished_work {
            Some(finished) => Ok(Some(EffectSummary::capture(&self.arena, &finished.effects)?)),
            None => Ok(None),
        }
    }

    /// Whether a render is paused mid-tree.
    pub fn is_rendering(&self) -> bool {
        self.session.is_some()
    }

    /// Metrics of the most recent commit.
    pub fn last_metrics(&self) -> Option<&RenderMetrics> {
        self.last_metrics.as_ref()
    }

    /// Lifetime totals.
    pub fn totals(&self) -> ReconcilerTotals {
        self.totals
    }

    /// Arena allocation counters.
    pub fn arena_stats(&self) -> ArenaStats {
        self.arena.stats()
    }

    /// Number of live fiber instances across all roots.
    pub fn live_instances(&self) -> usize {
        self.arena.live_count()
    }

    /// The active configuration.
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// The host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The host, mutably.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// The scheduler.
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// The scheduler, mutably.
    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    // ── Internal: lookup ────────────────────────────────────────

    fn root(&self, root: RootId) -> Result<&Root, ScheduleError> {
        self.roots.get(&root).ok_or(ScheduleError::UnknownRoot { root })
    }

    fn live_root(&self, root: RootId) -> Result<&Root, ScheduleError> {
        let record = self.root(root)?;
        if record.disabled {
            return Err(ScheduleError::RootDisabled { root });
        }
        Ok(record)
    }

    fn live_root_mut(&mut self, root: RootId) -> Result<&mut Root, ScheduleError> {
        let record = self
            .roots
            .get_mut(&root)
            .ok_or(ScheduleError::UnknownRoot { root })?;
        if record.disabled {
            return Err(ScheduleError::RootDisabled { root });
        }
        Ok(record)
    }

    /// Walk return links from `instance` to its root.
    fn find_root_of(&self, instance: InstanceId) -> Result<RootId, ReconcileError> {
        let mut node = instance;
        loop {
            let fiber = self.arena.get(self.arena.any_buffer(node)?)?;
            match fiber.return_fiber {
                Some(parent) if self.arena.is_live(parent.instance()) => node = parent.instance(),
                Some(_) => return Err(ScheduleError::NotMounted { instance }.into()),
                None => {
                    return match (fiber.tag, fiber.state_node) {
                        (WorkTag::HostRoot, StateNode::Root { root, .. }) => Ok(root),
                        _ => Err(ScheduleError::NotMounted { instance }.into()),
                    }
                }
            }
        }
    }

    fn find_highest_priority_root(&self) -> Option<(RootId, ExpirationTime)> {
        self.roots
            .values()
            .filter(|r| r.is_scheduled())
            .fold(None, |best, r| match best {
                Some((_, level)) if level >= r.scheduled => best,
                _ => Some((r.id, r.scheduled)),
            })
    }

    fn work_status(&self) -> WorkStatus {
        match self.find_highest_priority_root() {
            Some((_, level)) => WorkStatus::Pending(level),
            None => WorkStatus::Idle,
        }
    }

    // ── Internal: scheduling ────────────────────────────────────

    fn compute_expiration(&mut self, priority: PriorityLevel, options: RootOptions) -> ExpirationTime {
        if self.is_committing || !options.concurrent {
            return ExpirationTime::SYNC;
        }
        let hold = self.is_performing
            || self
                .find_highest_priority_root()
                .is_some_and(|(_, level)| level > ExpirationTime::NEVER);
        let current = self.clock.request_current_time(self.scheduler.now_ms(), hold);
        let expiration = self.clock.expiration_for(current, priority, &self.config);
        match &self.session {
            // Land just below the in-flight render so the update is not
            // folded into a tree that has already passed its fiber.
            Some(session)
                if session.expiration == expiration
                    && expiration != ExpirationTime::SYNC
                    && expiration > ExpirationTime::NEVER =>
            {
                ExpirationTime::from_raw(expiration.raw() - 1)
            }
            _ => expiration,
        }
    }

    /// Record pending work on `instance` and its ancestors, interrupt a
    /// less urgent render, and request time to do the work.
    fn schedule_work(&mut self, instance: InstanceId, expiration: ExpirationTime) -> Result<(), ReconcileError> {
        let root = self.schedule_work_to_root(instance, expiration)?;

        if self.session.as_ref().is_some_and(|s| expiration > s.expiration) {
            debug!(%root, ?expiration, "interrupting less urgent render");
            self.discard_session();
            self.totals.restarts += 1;
        }

        let record = self.live_root_mut(root)?;
        record.mark_pending(expiration);
        record.scheduled = record.next_expiration();
        let level = record.scheduled;
        self.request_work(level)
    }

    fn schedule_work_to_root(
        &mut self,
        instance: InstanceId,
        expiration: ExpirationTime,
    ) -> Result<RootId, ReconcileError> {
        self.arena.for_each_buffer(instance, |fiber| {
            if fiber.expiration_time < expiration {
                fiber.expiration_time = expiration;
            }
        })?;
        let mut node = instance;
        loop {
            let (parent, tag, state_node) = {
                let fiber = self.arena.get(self.arena.any_buffer(node)?)?;
                (fiber.return_fiber, fiber.tag, fiber.state_node)
            };
            match parent {
                Some(parent) => {
                    self.arena
                        .for_each_buffer(parent.instance(), |fiber| {
                            if fiber.child_expiration_time < expiration {
                                fiber.child_expiration_time = expiration;
                            }
                        })
                        .map_err(|_| ScheduleError::NotMounted { instance })?;
                    node = parent.instance();
                }
                None => {
                    return match (tag, state_node) {
                        (WorkTag::HostRoot, StateNode::Root { root, .. }) => Ok(root),
                        _ => Err(ScheduleError::NotMounted { instance }.into()),
                    }
                }
            }
        }
    }

    fn request_work(&mut self, expiration: ExpirationTime) -> Result<(), ReconcileError> {
        if self.is_performing || self.is_batching {
            return Ok(());
        }
        if expiration == ExpirationTime::SYNC {
            self.perform_sync_work()
        } else {
            self.schedule_callback_with_expiration(expiration);
            Ok(())
        }
    }

    fn schedule_callback_with_expiration(&mut self, expiration: ExpirationTime) {
        if let Some((task, existing)) = self.callback {
            if expiration <= existing {
                return;
            }
            self.scheduler.cancel_callback(task);
            debug!(?task, "cancelled less urgent callback");
        }
        let now = self.clock.recompute(self.scheduler.now_ms());
        let timeout = self.clock.timeout_ms(expiration);
        let interactive_ms = self.config.interactive_expiration_ms + self.config.interactive_bucket_ms;
        let priority = PriorityLevel::from_expiration(expiration, now, interactive_ms);
        let task = self.scheduler.schedule_callback(priority, timeout);
        debug!(?task, %priority, ?timeout, "callback requested");
        self.callback = Some((task, expiration));
    }

    fn schedule_remaining(&mut self) {
        if let Some((_, level)) = self.find_highest_priority_root() {
            self.schedule_callback_with_expiration(level);
        }
    }

    fn should_yield(&mut self) -> bool {
        if !self.did_yield && self.scheduler.should_yield() {
            self.did_yield = true;
        }
        self.did_yield
    }

    fn discard_session(&mut self) {
        if let Some(session) = self.session.take() {
            let freed = session.discard(&mut self.arena);
            debug!(freed, "work-in-progress discarded");
        }
    }

    // ── Internal: performing ────────────────────────────────────

    fn perform_work(&mut self, min_expiration: ExpirationTime, yieldy: bool) -> Result<(), ReconcileError> {
        if self.is_performing {
            return Ok(());
        }
        self.is_performing = true;
        self.did_yield = false;
        let result = self.perform_work_loop(min_expiration, yieldy);
        self.is_performing = false;
        self.did_yield = false;
        self.schedule_remaining();
        result
    }

    fn perform_work_loop(&mut self, min_expiration: ExpirationTime, yieldy: bool) -> Result<(), ReconcileError> {
        self.drain_inbox()?;
        let mut last_committed: Option<RootId> = None;
        let mut nested_updates = 0u32;

        while let Some((root, level)) = self.find_highest_priority_root() {
            if level < min_expiration {
                break;
            }
            let yieldy_root = if yieldy {
                let now = self.clock.recompute(self.scheduler.now_ms());
                let expired = now <= level;
                if self.did_yield && !expired {
                    break;
                }
                !expired
            } else {
                false
            };

            if !self.perform_work_on_root(root, level, yieldy_root)? {
                break;
            }

            if last_committed == Some(root) {
                nested_updates += 1;
                if nested_updates > self.config.max_nested_updates {
                    let limit = self.config.max_nested_updates;
                    if let Some(record) = self.roots.get_mut(&root) {
                        record.scheduled = ExpirationTime::NO_WORK;
                    }
                    error!(%root, limit, "nested update limit reached; root unscheduled");
                    return Err(ScheduleError::NestedUpdateLimit { limit }.into());
                }
            } else {
                last_committed = Some(root);
                nested_updates = 0;
            }
            self.drain_inbox()?;
        }
        Ok(())
    }

    /// Returns whether the root committed.
    fn perform_work_on_root(
        &mut self,
        root: RootId,
        expiration: ExpirationTime,
        yieldy: bool,
    ) -> Result<bool, ReconcileError> {
        if self.root(root)?.finished_work.is_some() {
            self.complete_root(root)?;
            return Ok(true);
        }
        match self.render_root(root, expiration, yieldy)? {
            LoopStatus::Yielded => {
                self.did_yield = true;
                Ok(false)
            }
            LoopStatus::Completed => {
                if yieldy && self.should_yield() {
                    debug!(%root, "render complete; commit deferred to the next slice");
                    return Ok(false);
                }
                self.complete_root(root)?;
                Ok(true)
            }
        }
    }

    fn start_session(&mut self, root: RootId, expiration: ExpirationTime) -> Result<RenderSession, ReconcileError> {
        let record = self.root(root)?;
        let current = record.current;
        let context_changed = record.pending_context.is_some();
        let context = record
            .pending_context
            .clone()
            .or_else(|| record.context.clone());
        let props = {
            let fiber = self.arena.get(current)?;
            fiber
                .memoized_props
                .clone()
                .unwrap_or_else(|| fiber.pending_props.clone())
        };
        let wip = self.arena.create_work_in_progress(current, props)?;
        self.arena.set_return(wip, None)?;
        debug!(%root, ?expiration, "render started");
        Ok(RenderSession::new(root, expiration, wip, context, context_changed))
    }

    fn render_root(
        &mut self,
        root: RootId,
        expiration: ExpirationTime,
        yieldy: bool,
    ) -> Result<LoopStatus, ReconcileError> {
        let mut session = match self.session.take() {
            Some(session) if session.is_rendering(root, expiration) => session,
            stale => {
                if let Some(stale) = stale {
                    debug!(root = %stale.root, expiration = ?stale.expiration, "discarding in-progress render");
                    stale.discard(&mut self.arena);
                    self.totals.restarts += 1;
                }
                self.start_session(root, expiration)?
            }
        };

        let status = {
            let mut cx = RenderCx {
                arena: &mut self.arena,
                host: &mut self.host,
                session: &mut session,
            };
            work_loop(&mut cx, &mut self.scheduler, yieldy)
        };

        match status {
            Ok(LoopStatus::Yielded) => {
                self.session = Some(session);
                Ok(LoopStatus::Yielded)
            }
            Ok(LoopStatus::Completed) => {
                let record = self
                    .roots
                    .get_mut(&root)
                    .ok_or(ScheduleError::UnknownRoot { root })?;
                record.consecutive_failures = 0;
                debug!(
                    %root,
                    effects = session.effects.len(),
                    units = session.metrics.units_of_work,
                    "render complete"
                );
                record.finished_work = Some(session.finish());
                Ok(LoopStatus::Completed)
            }
            Err(err) => {
                session.discard(&mut self.arena);
                self.record_render_failure(root, &err);
                Err(err.into())
            }
        }
    }

    fn record_render_failure(&mut self, root: RootId, err: &RenderError) {
        self.totals.render_failures += 1;
        let limit = self.config.max_consecutive_failures;
        let Some(record) = self.roots.get_mut(&root) else {
            return;
        };
        record.consecutive_failures += 1;
        record.scheduled = ExpirationTime::NO_WORK;
        warn!(
            %root,
            failures = record.consecutive_failures,
            error = %err,
            "render failed; committed tree kept"
        );
        if record.consecutive_failures >= limit && !record.disabled {
            record.disabled = true;
            self.totals.disabled_roots += 1;
            error!(%root, limit, "root disabled after repeated render failures");
        }
    }

    fn complete_root(&mut self, root: RootId) -> Result<(), ReconcileError> {
        let record = self
            .roots
            .get_mut(&root)
            .ok_or(ScheduleError::UnknownRoot { root })?;
        let Some(finished) = record.finished_work.take() else {
            return Ok(());
        };
        let FinishedWork {
            fiber,
            effects,
            expiration,
            context,
            swap_context,
            mut metrics,
        } = finished;

        self.is_committing = true;
        let result = {
            let mut cx = CommitCx {
                arena: &mut self.arena,
                host: &mut self.host,
                metrics: &mut metrics,
            };
            commit::commit_root(&mut cx, record, fiber, &effects)
        };
        self.is_committing = false;

        if let Err(err) = result {
            record.disabled = true;
            record.scheduled = ExpirationTime::NO_WORK;
            self.totals.disabled_roots += 1;
            error!(%root, error = %err, "commit failed; root disabled");
            return Err(err.into());
        }

        if swap_context {
            if record.pending_context == context {
                record.pending_context = None;
            }
            record.context = context;
        }

        let remaining = {
            let finished = self.arena.get(fiber)?;
            finished
                .expiration_time
                .most_urgent(finished.child_expiration_time)
        };
        record.mark_committed(remaining);
        record.scheduled = record.next_expiration();
        self.totals.commits += 1;
        debug!(
            %root,
            ?expiration,
            ?remaining,
            placements = metrics.placements,
            updates = metrics.updates,
            deletions = metrics.deletions,
            "committed"
        );
        self.last_metrics = Some(metrics);
        Ok(())
    }

    /// Apply every queued message. Messages that no longer fit the tree
    /// are dropped with a warning; any other failure is returned once the
    /// whole batch has been applied.
    fn drain_inbox(&mut self) -> Result<(), ReconcileError> {
        let mut first_error: Option<ReconcileError> = None;
        for message in self.inbox.drain() {
            let outcome = match message {
                InboxMessage::Root {
                    root,
                    element,
                    priority,
                } => self
                    .schedule_update_with_priority(root, element, priority, None)
                    .map(|_| ()),
                InboxMessage::Instance {
                    instance,
                    update,
                    priority,
                } => self.enqueue_update(instance, update, priority).map(|_| ()),
            };
            match outcome {
                Ok(()) => self.totals.inbox_messages += 1,
                Err(ReconcileError::Schedule(
                    err @ (ScheduleError::UnknownRoot { .. }
                    | ScheduleError::StaleInstance { .. }
                    | ScheduleError::NotMounted { .. }
                    | ScheduleError::NotStateful { .. }
                    | ScheduleError::RootDisabled { .. }),
                )) => warn!(error = %err, "inbox update dropped"),
                Err(err) => {
                    error!(error = %err, "inbox update failed");
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<H: HostConfig, S: Scheduler> std::fmt::Debug for Reconciler<H, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("roots", &self.roots.len())
            .field("live_instances", &self.arena.live_count())
            .field("rendering", &self.session.is_some())
            .field("queued_messages", &self.inbox.len())
            .field("totals", &self.totals)
            .finish()
    }
}
