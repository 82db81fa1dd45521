//! Arena-specific error types.

use std::error::Error;
use std::fmt;

use trellis_core::InstanceId;

use crate::handle::FiberRef;

/// Errors that can occur during arena operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// The live-instance ceiling was reached.
    CapacityExceeded {
        /// The configured ceiling.
        max_instances: u32,
    },
    /// The instance's slot has been freed (and possibly reused).
    StaleInstance {
        /// The stale identifier.
        instance: InstanceId,
    },
    /// The referenced side of a live slot holds no fiber.
    MissingBuffer {
        /// The empty reference.
        fiber: FiberRef,
    },
    /// The arena configuration is inconsistent.
    InvalidConfig {
        /// Why the configuration was rejected.
        reason: String,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded { max_instances } => {
                write!(f, "fiber arena full: {max_instances} live instances")
            }
            Self::StaleInstance { instance } => write!(f, "stale instance {instance}"),
            Self::MissingBuffer { fiber } => write!(f, "no fiber stored at {fiber}"),
            Self::InvalidConfig { reason } => write!(f, "invalid arena config: {reason}"),
        }
    }
}

impl Error for ArenaError {}
