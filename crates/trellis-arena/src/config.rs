//! Arena configuration parameters.

use crate::error::ArenaError;

/// Configuration for the fiber arena.
///
/// Validated at construction; immutable afterwards.
#[derive(Clone, Debug)]
pub struct ArenaConfig {
    /// Number of slots reserved up front.
    ///
    /// Default: 256. Growth beyond this is amortized by `Vec`.
    pub initial_capacity: usize,

    /// Maximum number of live instances.
    ///
    /// Default: 1_048_576. Allocation past this returns
    /// [`ArenaError::CapacityExceeded`]. Must be at least 1.
    pub max_instances: u32,
}

impl ArenaConfig {
    /// Default number of pre-reserved slots.
    pub const DEFAULT_INITIAL_CAPACITY: usize = 256;

    /// Default live-instance ceiling.
    pub const DEFAULT_MAX_INSTANCES: u32 = 1 << 20;

    /// Check the configuration for internal consistency.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.max_instances == 0 {
            return Err(ArenaError::InvalidConfig {
                reason: "max_instances must be at least 1".into(),
            });
        }
        if self.initial_capacity > self.max_instances as usize {
            return Err(ArenaError::InvalidConfig {
                reason: format!(
                    "initial_capacity ({}) exceeds max_instances ({})",
                    self.initial_capacity, self.max_instances
                ),
            });
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            initial_capacity: Self::DEFAULT_INITIAL_CAPACITY,
            max_instances: Self::DEFAULT_MAX_INSTANCES,
        }
    }
}
