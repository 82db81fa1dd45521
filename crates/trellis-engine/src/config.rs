//! Reconciler configuration, validation, and error types.

use std::error::Error;
use std::fmt;

use trellis_arena::{ArenaConfig, ArenaError};
use trellis_core::expiration::UNIT_SIZE_MS;

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`ReconcilerConfig::validate()`].
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// Arena configuration is invalid.
    Arena(ArenaError),
    /// A deadline or bucket size is zero or not a multiple of the
    /// 10 ms expiration unit.
    InvalidDuration {
        /// Which setting was rejected.
        name: &'static str,
        /// The configured value.
        value_ms: u64,
    },
    /// A bucket is wider than the deadline it rounds.
    BucketExceedsExpiration {
        /// Which priority class.
        class: &'static str,
        /// Configured bucket size.
        bucket_ms: u64,
        /// Configured deadline.
        expiration_ms: u64,
    },
    /// `max_consecutive_failures` is zero.
    FailureLimitZero,
    /// `max_nested_updates` is zero.
    NestedUpdateLimitZero,
    /// `inbox_capacity` is zero.
    InboxCapacityZero,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arena(e) => write!(f, "arena: {e}"),
            Self::InvalidDuration { name, value_ms } => write!(
                f,
                "{name} must be a non-zero multiple of {UNIT_SIZE_MS} ms, got {value_ms}"
            ),
            Self::BucketExceedsExpiration {
                class,
                bucket_ms,
                expiration_ms,
            } => write!(
                f,
                "{class} bucket ({bucket_ms} ms) exceeds its expiration ({expiration_ms} ms)"
            ),
            Self::FailureLimitZero => write!(f, "max_consecutive_failures must be at least 1"),
            Self::NestedUpdateLimitZero => write!(f, "max_nested_updates must be at least 1"),
            Self::InboxCapacityZero => write!(f, "inbox_capacity must be at least 1"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Arena(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ArenaError> for ConfigError {
    fn from(e: ArenaError) -> Self {
        Self::Arena(e)
    }
}

// ── ReconcilerConfig ───────────────────────────────────────────────

/// Complete configuration for constructing a
/// [`Reconciler`](crate::Reconciler).
#[derive(Clone, Debug)]
pub struct ReconcilerConfig {
    /// Fiber arena sizing.
    pub arena: ArenaConfig,
    /// Deadline for normal and low priority updates. Default: 5000.
    pub async_expiration_ms: u64,
    /// Bucket width for normal and low priority updates. Default: 250.
    pub async_bucket_ms: u64,
    /// Deadline for user-blocking updates. Default: 150.
    pub interactive_expiration_ms: u64,
    /// Bucket width for user-blocking updates. Default: 100.
    pub interactive_bucket_ms: u64,
    /// Consecutive render failures before a root is disabled. Default: 3.
    pub max_consecutive_failures: u32,
    /// Synchronous commits that may chain through the update inbox in
    /// one flush before it fails. Default: 50.
    pub max_nested_updates: u32,
    /// Capacity of the cross-thread update inbox. Default: 1024.
    pub inbox_capacity: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            arena: ArenaConfig::default(),
            async_expiration_ms: 5000,
            async_bucket_ms: 250,
            interactive_expiration_ms: 150,
            interactive_bucket_ms: 100,
            max_consecutive_failures: 3,
            max_nested_updates: 50,
            inbox_capacity: 1024,
        }
    }
}

impl ReconcilerConfig {
    /// Validate all structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.arena.validate()?;
        for (name, value_ms) in [
            ("async_expiration_ms", self.async_expiration_ms),
            ("async_bucket_ms", self.async_bucket_ms),
            ("interactive_expiration_ms", self.interactive_expiration_ms),
            ("interactive_bucket_ms", self.interactive_bucket_ms),
        ] {
            if value_ms == 0 || value_ms % UNIT_SIZE_MS != 0 {
                return Err(ConfigError::InvalidDuration { name, value_ms });
            }
        }
        for (class, bucket_ms, expiration_ms) in [
            ("async", self.async_bucket_ms, self.async_expiration_ms),
            (
                "interactive",
                self.interactive_bucket_ms,
                self.interactive_expiration_ms,
            ),
        ] {
            if bucket_ms > expiration_ms {
                return Err(ConfigError::BucketExceedsExpiration {
                    class,
                    bucket_ms,
                    expiration_ms,
                });
            }
        }
        if self.max_consecutive_failures == 0 {
            return Err(ConfigError::FailureLimitZero);
        }
        if self.max_nested_updates == 0 {
            return Err(ConfigError::NestedUpdateLimitZero);
        }
        if self.inbox_capacity == 0 {
            return Err(ConfigError::InboxCapacityZero);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(ReconcilerConfig::default().validate().is_ok());
    }

    #[test]
    fn off_unit_duration_rejected() {
        let cfg = ReconcilerConfig {
            async_bucket_ms: 255,
            ..ReconcilerConfig::default()
        };
        match cfg.validate() {
            Err(ConfigError::InvalidDuration {
                name: "async_bucket_ms",
                value_ms: 255,
            }) => {}
            other => panic!("expected InvalidDuration, got {other:?}"),
        }
    }

    #[test]
    fn zero_duration_rejected() {
        let cfg = ReconcilerConfig {
            interactive_expiration_ms: 0,
            ..ReconcilerConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn wide_bucket_rejected() {
        let cfg = ReconcilerConfig {
            interactive_bucket_ms: 500,
            ..ReconcilerConfig::default()
        };
        match cfg.validate() {
            Err(ConfigError::BucketExceedsExpiration {
                class: "interactive",
                ..
            }) => {}
            other => panic!("expected BucketExceedsExpiration, got {other:?}"),
        }
    }

    #[test]
    fn zero_limits_rejected() {
        let cfg = ReconcilerConfig {
            max_consecutive_failures: 0,
            ..ReconcilerConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::FailureLimitZero));

        let cfg = ReconcilerConfig {
            max_nested_updates: 0,
            ..ReconcilerConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::NestedUpdateLimitZero));

        let cfg = ReconcilerConfig {
            inbox_capacity: 0,
            ..ReconcilerConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::InboxCapacityZero));
    }

    #[test]
    fn arena_errors_are_wrapped() {
        let cfg = ReconcilerConfig {
            arena: ArenaConfig {
                initial_capacity: 0,
                max_instances: 0,
            },
            ..ReconcilerConfig::default()
        };
        match cfg.validate() {
            Err(ConfigError::Arena(ArenaError::InvalidConfig { .. })) => {}
            other => panic!("expected Arena(InvalidConfig), got {other:?}"),
        }
    }
}
