//! Prioritized state updates and the per-instance queue that holds them.
//!
//! A queue keeps updates in insertion order together with a base state.
//! Processing at a render expiration applies every update that is due
//! and skips the rest. The first skipped update pins the new base state:
//! it and everything after it stay queued, so a later pass replays them
//! in their original order against the state they were issued on top of.

use std::fmt;
use std::sync::Arc;

use crate::expiration::ExpirationTime;
use crate::node::{Callback, Props};
use crate::value::ValueMap;

type ReducerFn = dyn Fn(&ValueMap, &Props) -> ValueMap + Send + Sync;

/// How an update combines with the previous state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UpdateTag {
    /// The payload replaces the state.
    ReplaceState,
    /// The payload is merged over the state.
    UpdateState,
    /// No state change; forces the instance to re-render.
    ForceUpdate,
    /// Merged like [`UpdateTag::UpdateState`] and marks the fiber as
    /// having captured a failure.
    CaptureUpdate,
}

/// The state change carried by an update.
#[derive(Clone, Default)]
pub enum StatePayload {
    /// No change.
    #[default]
    None,
    /// A literal partial (or complete) state.
    Value(ValueMap),
    /// Computes the partial state from the previous state and props.
    Reducer(Arc<ReducerFn>),
}

impl StatePayload {
    fn resolve(&self, prev: &ValueMap, props: &Props) -> Option<ValueMap> {
        match self {
            Self::None => None,
            Self::Value(map) => Some(map.clone()),
            Self::Reducer(f) => Some(f(prev, props)),
        }
    }
}

impl fmt::Debug for StatePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Value(map) => f.debug_tuple("Value").field(map).finish(),
            Self::Reducer(_) => write!(f, "Reducer(..)"),
        }
    }
}

/// A single state update.
#[derive(Clone)]
pub struct Update {
    /// Deadline the update must be applied by. Assigned by the engine.
    pub expiration_time: ExpirationTime,
    /// How the payload combines with the state.
    pub tag: UpdateTag,
    /// The state change.
    pub payload: StatePayload,
    /// Invoked after the update is committed for good.
    pub callback: Option<Callback>,
}

impl Update {
    fn with_tag(tag: UpdateTag, payload: StatePayload) -> Self {
        Self {
            expiration_time: ExpirationTime::NO_WORK,
            tag,
            payload,
            callback: None,
        }
    }

    /// Merge `partial` over the state.
    pub fn merge(partial: ValueMap) -> Self {
        Self::with_tag(UpdateTag::UpdateState, StatePayload::Value(partial))
    }

    /// Replace the state with `state`.
    pub fn replace(state: ValueMap) -> Self {
        Self::with_tag(UpdateTag::ReplaceState, StatePayload::Value(state))
    }

    /// Merge the result of `f(prev_state, props)` over the state.
    pub fn reducer<F>(f: F) -> Self
    where
        F: Fn(&ValueMap, &Props) -> ValueMap + Send + Sync + 'static,
    {
        Self::with_tag(UpdateTag::UpdateState, StatePayload::Reducer(Arc::new(f)))
    }

    /// Force a re-render without changing state.
    pub fn force() -> Self {
        Self::with_tag(UpdateTag::ForceUpdate, StatePayload::None)
    }

    /// Merge `partial` and flag the fiber as having captured a failure.
    pub fn capture(partial: ValueMap) -> Self {
        Self::with_tag(UpdateTag::CaptureUpdate, StatePayload::Value(partial))
    }

    /// Attach a commit callback.
    pub fn with_callback<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Update")
            .field("expiration_time", &self.expiration_time)
            .field("tag", &self.tag)
            .field("payload", &self.payload)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// Outcome of [`UpdateQueue::process`].
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessedQueue {
    /// State after applying every due update.
    pub state: ValueMap,
    /// Most urgent expiration among the skipped updates, or
    /// [`ExpirationTime::NO_WORK`] if none were skipped.
    pub remaining: ExpirationTime,
    /// A [`UpdateTag::ForceUpdate`] was applied.
    pub force_update: bool,
    /// A [`UpdateTag::CaptureUpdate`] was applied.
    pub captured: bool,
    /// At least one callback is waiting for commit.
    pub has_callbacks: bool,
}

/// Ordered queue of pending updates for one instance.
///
/// Fibers hold their queue behind an `Arc`. The current and
/// work-in-progress buffers share one allocation until the render
/// processes it, at which point the work-in-progress copy is cloned on
/// write; discarding that render leaves the committed queue untouched.
#[derive(Clone, Default)]
pub struct UpdateQueue {
    base_state: ValueMap,
    updates: Vec<Arc<Update>>,
    callbacks: Vec<Callback>,
}

impl UpdateQueue {
    /// An empty queue whose base state is `base_state`.
    pub fn new(base_state: ValueMap) -> Self {
        Self {
            base_state,
            updates: Vec::new(),
            callbacks: Vec::new(),
        }
    }

    /// Append an update.
    pub fn push(&mut self, update: Arc<Update>) {
        self.updates.push(update);
    }

    /// Number of queued updates.
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    /// Whether no updates are queued.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// State the queued updates apply on top of.
    pub fn base_state(&self) -> &ValueMap {
        &self.base_state
    }

    /// Queued updates in insertion order.
    pub fn pending(&self) -> impl Iterator<Item = &Update> {
        self.updates.iter().map(|u| &**u)
    }

    /// Most urgent expiration among the queued updates.
    pub fn most_urgent(&self) -> ExpirationTime {
        self.updates
            .iter()
            .map(|u| u.expiration_time)
            .max()
            .unwrap_or(ExpirationTime::NO_WORK)
    }

    /// Whether callbacks are waiting for commit.
    pub fn has_callbacks(&self) -> bool {
        !self.callbacks.is_empty()
    }

    /// Remove and return the callbacks waiting for commit.
    pub fn take_callbacks(&mut self) -> Vec<Callback> {
        std::mem::take(&mut self.callbacks)
    }

    /// Apply every update due at `render_expiration`.
    ///
    /// Updates less urgent than `render_expiration` are skipped. The
    /// first skipped update and everything after it remain queued and
    /// the base state becomes the state just before it. Callbacks are
    /// collected only for updates that leave the queue, so each fires
    /// exactly once.
    pub fn process(&mut self, props: &Props, render_expiration: ExpirationTime) -> ProcessedQueue {
        let mut state = self.base_state.clone();
        let mut new_base: Option<ValueMap> = None;
        let mut first_skipped: Option<usize> = None;
        let mut remaining = ExpirationTime::NO_WORK;
        let mut force_update = false;
        let mut captured = false;

        for (i, update) in self.updates.iter().enumerate() {
            if update.expiration_time < render_expiration {
                if first_skipped.is_none() {
                    first_skipped = Some(i);
                    new_base = Some(state.clone());
                }
                remaining = remaining.most_urgent(update.expiration_time);
                continue;
            }
            match update.tag {
                UpdateTag::ReplaceState => {
                    if let Some(next) = update.payload.resolve(&state, props) {
                        state = next;
                    }
                }
                UpdateTag::UpdateState | UpdateTag::CaptureUpdate => {
                    if let Some(partial) = update.payload.resolve(&state, props) {
                        state.extend(partial);
                    }
                    captured |= update.tag == UpdateTag::CaptureUpdate;
                }
                UpdateTag::ForceUpdate => force_update = true,
            }
            if first_skipped.is_none() {
                if let Some(cb) = &update.callback {
                    self.callbacks.push(cb.clone());
                }
            }
        }

        match first_skipped {
            Some(i) => {
                self.updates.drain(..i);
                self.base_state = new_base.unwrap_or_default();
            }
            None => {
                self.updates.clear();
                self.base_state = state.clone();
            }
        }

        ProcessedQueue {
            state,
            remaining,
            force_update,
            captured,
            has_callbacks: self.has_callbacks(),
        }
    }
}

impl fmt::Debug for UpdateQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateQueue")
            .field("base_state", &self.base_state)
            .field("updates", &self.updates)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}
