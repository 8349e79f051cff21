//! Error types for limiter construction.
//!
//! Only configuration can fail: admission denial is an [`Outcome`] value,
//! never an error (see the `outcome` module).
//!
//! [`Outcome`]: crate::Outcome

use std::time::Duration;

/// Errors produced when validating limiter configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LimiterError {
    /// Bucket capacity must be > 0.
    #[error("capacity must be > 0 (got {provided})")]
    InvalidCapacity {
        /// Value provided by caller.
        provided: u64,
    },
    /// Tokens added per interval must be > 0.
    #[error("refill_rate must be > 0 (got {provided})")]
    InvalidRefillRate {
        /// Value provided by caller.
        provided: u64,
    },
    /// Interval between refills must be > 0.
    #[error("refill_interval must be > 0 (got {0:?})")]
    InvalidRefillInterval(Duration),
    /// Idle TTL, when enabled, must be > 0.
    #[error("idle_ttl must be > 0 when set (got {0:?})")]
    InvalidIdleTtl(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offending_field() {
        let msg = LimiterError::InvalidCapacity { provided: 0 }.to_string();
        assert!(msg.contains("capacity"));
        assert!(msg.contains("0"));

        let msg = LimiterError::InvalidRefillRate { provided: 0 }.to_string();
        assert!(msg.contains("refill_rate"));

        let msg = LimiterError::InvalidRefillInterval(Duration::ZERO).to_string();
        assert!(msg.contains("refill_interval"));

        let msg = LimiterError::InvalidIdleTtl(Duration::ZERO).to_string();
        assert!(msg.contains("idle_ttl"));
    }
}
