//! Token bucket implementation with a lock-free counter.
//!
//! Semantics:
//! - A bucket starts full at `capacity` tokens.
//! - `try_take` removes one token if any are available. It never blocks and
//!   never errors: an empty bucket reports `Success(false)`.
//! - `refill` adds `refill_rate` tokens, clamped at `capacity`. It is driven
//!   every `refill_interval` by the background task (see the `refill` module)
//!   but is safe to call from anywhere.
//!
//! Invariants:
//! - `0 <= available <= capacity` at all times.
//! - The token count lives in a single `AtomicU64` and is only mutated through
//!   compare-and-swap, so concurrent takes and refills are linearizable:
//!   takes never over-admit and refills never push the count past capacity.

use crate::error::LimiterError;
use crate::outcome::Outcome;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Validated configuration for a token bucket.
///
/// ```rust
/// use std::time::Duration;
/// use tollgate::TokenBucketConfig;
///
/// let config = TokenBucketConfig::new(100, 10, Duration::from_secs(1))
///     .expect("valid config");
/// assert_eq!(config.capacity(), 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBucketConfig {
    capacity: u64,
    refill_rate: u64,
    refill_interval: Duration,
}

impl TokenBucketConfig {
    /// Create a config with validation.
    pub fn new(
        capacity: u64,
        refill_rate: u64,
        refill_interval: Duration,
    ) -> Result<Self, LimiterError> {
        if capacity == 0 {
            return Err(LimiterError::InvalidCapacity { provided: capacity });
        }
        if refill_rate == 0 {
            return Err(LimiterError::InvalidRefillRate { provided: refill_rate });
        }
        if refill_interval.is_zero() {
            return Err(LimiterError::InvalidRefillInterval(refill_interval));
        }
        Ok(Self { capacity, refill_rate, refill_interval })
    }

    /// Maximum tokens the bucket can hold (burst capacity).
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Tokens added per refill interval.
    pub fn refill_rate(&self) -> u64 {
        self.refill_rate
    }

    /// Time between refills.
    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }
}

/// A single-key token bucket.
///
/// Created full. Shared freely across threads/tasks behind an `Arc`; all
/// state is atomic.
#[derive(Debug)]
pub struct TokenBucket {
    tokens: AtomicU64,
    config: TokenBucketConfig,
}

impl TokenBucket {
    /// Create a bucket from a validated config, starting full.
    pub fn new(config: TokenBucketConfig) -> Self {
        Self { tokens: AtomicU64::new(config.capacity), config }
    }

    /// Attempt to take one token.
    ///
    /// Non-blocking. Returns `Success(true)` when a token was granted,
    /// `Success(false)` when the bucket is empty.
    pub fn try_take(&self) -> Outcome<bool> {
        loop {
            let current = self.tokens.load(Ordering::Acquire);
            debug_assert!(
                current <= self.config.capacity,
                "token count {} exceeds capacity {}",
                current,
                self.config.capacity
            );
            if current == 0 {
                tracing::trace!(target: "tollgate::bucket", "take denied, bucket empty");
                return Outcome::success(false);
            }
            match self.tokens.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Outcome::success(true),
                // Lost the race; re-read and retry.
                Err(_) => continue,
            }
        }
    }

    /// Add `refill_rate` tokens, clamped at `capacity`.
    ///
    /// Safe under concurrent `try_take`: the clamp and the add commit in one
    /// compare-and-swap, so interleavings neither lose tokens nor overfill.
    pub fn refill(&self) {
        loop {
            let current = self.tokens.load(Ordering::Acquire);
            debug_assert!(
                current <= self.config.capacity,
                "token count {} exceeds capacity {}",
                current,
                self.config.capacity
            );
            if current >= self.config.capacity {
                return;
            }
            let next = current
                .saturating_add(self.config.refill_rate)
                .min(self.config.capacity);
            match self.tokens.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    tracing::trace!(
                        target: "tollgate::bucket",
                        added = next - current,
                        available = next,
                        "refilled"
                    );
                    return;
                }
                Err(_) => continue,
            }
        }
    }

    /// Snapshot of tokens currently available.
    ///
    /// Observational only; by the time the caller acts on it the count may
    /// have changed.
    pub fn available(&self) -> u64 {
        self.tokens.load(Ordering::Acquire)
    }

    /// The bucket's configuration.
    pub fn config(&self) -> &TokenBucketConfig {
        &self.config
    }
}
