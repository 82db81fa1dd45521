//! Errors raised by code outside the engine: host environments and
//! user components.

use std::error::Error;
use std::fmt;

/// A host operation failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostError {
    /// The host operation that failed, e.g. `"insert_before"`.
    pub operation: &'static str,
    /// Human-readable description of the failure.
    pub reason: String,
}

impl HostError {
    /// Build an error for `operation`.
    pub fn new(operation: &'static str, reason: impl Into<String>) -> Self {
        Self {
            operation,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host {} failed: {}", self.operation, self.reason)
    }
}

impl Error for HostError {}

/// A user component failed to render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentError {
    /// Human-readable description of the failure.
    pub reason: String,
}

impl ComponentError {
    /// Build an error with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl Error for ComponentError {}
