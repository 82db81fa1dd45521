//! Fiber kinds.

use std::fmt;

/// What kind of node a fiber represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkTag {
    /// A component that has not rendered yet. Becomes
    /// [`WorkTag::FunctionComponent`] after its first render.
    IndeterminateComponent,
    /// A user component whose output is a [`Node`](crate::Node).
    FunctionComponent,
    /// The root of a tree, bound to a host container.
    HostRoot,
    /// A host element such as `div`.
    HostComponent,
    /// A host text node.
    HostText,
    /// A grouping node with no host representation.
    Fragment,
}

impl WorkTag {
    /// Whether the fiber owns a host instance.
    pub const fn is_host(self) -> bool {
        matches!(self, Self::HostComponent | Self::HostText)
    }

    /// Whether the fiber can act as the parent of host instances.
    pub const fn is_host_parent(self) -> bool {
        matches!(self, Self::HostComponent | Self::HostRoot)
    }

    /// Whether the fiber carries an update queue.
    pub const fn is_stateful(self) -> bool {
        matches!(
            self,
            Self::HostRoot | Self::FunctionComponent | Self::IndeterminateComponent
        )
    }
}

impl fmt::Display for WorkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
