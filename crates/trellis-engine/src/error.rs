//! Engine error types, organized by phase: render, commit, scheduling.
//!
//! Render errors are recoverable: the in-progress tree is discarded and
//! the committed tree is untouched. Commit errors are not; the host may
//! already have been partially mutated, so the root is disabled.
//! Scheduling errors are contract violations by the caller.

use std::error::Error;
use std::fmt;

use trellis_arena::ArenaError;
use trellis_core::{ComponentError, EffectTag, HostError, InstanceId, Key, RootId, WorkTag};

use crate::config::ConfigError;

/// Failures raised while building a work-in-progress tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderError {
    /// A component's render function returned an error.
    Component {
        /// Component display name.
        name: String,
        /// Instance that was rendering.
        instance: InstanceId,
        /// The component's error.
        source: ComponentError,
    },
    /// Two siblings in one list share a key.
    DuplicateKey {
        /// The repeated key.
        key: Key,
        /// Instance whose children were being reconciled.
        parent: InstanceId,
    },
    /// The host failed to create an instance.
    Host(HostError),
    /// A fiber reference could not be resolved.
    Arena(ArenaError),
    /// A host fiber reached a point where it must own a host instance
    /// but does not.
    MissingHostInstance {
        /// The fiber's instance.
        instance: InstanceId,
    },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Component {
                name,
                instance,
                source,
            } => write!(f, "component '{name}' ({instance}) failed: {source}"),
            Self::DuplicateKey { key, parent } => {
                write!(f, "duplicate key '{key}' among children of {parent}")
            }
            Self::Host(e) => write!(f, "{e}"),
            Self::Arena(e) => write!(f, "arena: {e}"),
            Self::MissingHostInstance { instance } => {
                write!(f, "host fiber {instance} has no host instance")
            }
        }
    }
}

impl Error for RenderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Component { source, .. } => Some(source),
            Self::Host(e) => Some(e),
            Self::Arena(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ArenaError> for RenderError {
    fn from(e: ArenaError) -> Self {
        Self::Arena(e)
    }
}

impl From<HostError> for RenderError {
    fn from(e: HostError) -> Self {
        Self::Host(e)
    }
}

/// Failures raised while applying an effect list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitError {
    /// A host mutation failed.
    Host {
        /// The effect being applied.
        effect: EffectTag,
        /// The fiber being committed.
        instance: InstanceId,
        /// The host's error.
        source: HostError,
    },
    /// A fiber reference could not be resolved.
    Arena(ArenaError),
    /// A host fiber has no host instance to mutate.
    MissingHostInstance {
        /// The fiber's instance.
        instance: InstanceId,
    },
}

impl fmt::Display for CommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host {
                effect,
                instance,
                source,
            } => write!(f, "commit of {effect} on {instance} failed: {source}"),
            Self::Arena(e) => write!(f, "arena: {e}"),
            Self::MissingHostInstance { instance } => {
                write!(f, "host fiber {instance} has no host instance")
            }
        }
    }
}

impl Error for CommitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Host { source, .. } => Some(source),
            Self::Arena(e) => Some(e),
            Self::MissingHostInstance { .. } => None,
        }
    }
}

impl From<ArenaError> for CommitError {
    fn from(e: ArenaError) -> Self {
        Self::Arena(e)
    }
}

/// Misuse of the scheduling API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScheduleError {
    /// No root with this id exists.
    UnknownRoot {
        /// The requested root.
        root: RootId,
    },
    /// The instance's slot has been freed.
    StaleInstance {
        /// The stale identifier.
        instance: InstanceId,
    },
    /// The instance is not attached to any root.
    NotMounted {
        /// The detached instance.
        instance: InstanceId,
    },
    /// The instance kind cannot hold state.
    NotStateful {
        /// The target instance.
        instance: InstanceId,
        /// Its kind.
        tag: WorkTag,
    },
    /// The root was disabled after repeated render failures or a failed
    /// commit.
    RootDisabled {
        /// The disabled root.
        root: RootId,
    },
    /// Synchronous commits kept scheduling more synchronous work.
    NestedUpdateLimit {
        /// The configured limit.
        limit: u32,
    },
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownRoot { root } => write!(f, "unknown root {root}"),
            Self::StaleInstance { instance } => write!(f, "instance {instance} is unmounted"),
            Self::NotMounted { instance } => {
                write!(f, "instance {instance} is not attached to a root")
            }
            Self::NotStateful { instance, tag } => {
                write!(f, "instance {instance} ({tag}) cannot receive state updates")
            }
            Self::RootDisabled { root } => write!(f, "{root} is disabled"),
            Self::NestedUpdateLimit { limit } => write!(
                f,
                "more than {limit} nested synchronous updates; a commit callback is likely scheduling itself"
            ),
        }
    }
}

impl Error for ScheduleError {}

/// Umbrella error returned by [`Reconciler`](crate::Reconciler) entry
/// points.
#[derive(Debug, PartialEq)]
pub enum ReconcileError {
    /// Render phase failed; the committed tree is intact.
    Render(RenderError),
    /// Commit phase failed; the root has been disabled.
    Commit(CommitError),
    /// The call violated the scheduling contract.
    Schedule(ScheduleError),
    /// A fiber reference could not be resolved.
    Arena(ArenaError),
    /// The configuration was rejected.
    Config(ConfigError),
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render(e) => write!(f, "render: {e}"),
            Self::Commit(e) => write!(f, "commit: {e}"),
            Self::Schedule(e) => write!(f, "schedule: {e}"),
            Self::Arena(e) => write!(f, "arena: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Render(e) => Some(e),
            Self::Commit(e) => Some(e),
            Self::Schedule(e) => Some(e),
            Self::Arena(e) => Some(e),
            Self::Config(e) => Some(e),
        }
    }
}

impl From<RenderError> for ReconcileError {
    fn from(e: RenderError) -> Self {
        Self::Render(e)
    }
}

impl From<CommitError> for ReconcileError {
    fn from(e: CommitError) -> Self {
        Self::Commit(e)
    }
}

impl From<ScheduleError> for ReconcileError {
    fn from(e: ScheduleError) -> Self {
        Self::Schedule(e)
    }
}

impl From<ArenaError> for ReconcileError {
    fn from(e: ArenaError) -> Self {
        Self::Arena(e)
    }
}

impl From<ConfigError> for ReconcileError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
