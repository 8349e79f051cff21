//! Convenient re-exports for common Tollgate types.
pub use crate::{
    bucket::{TokenBucket, TokenBucketConfig},
    clock::{Clock, MonotonicClock},
    error::LimiterError,
    outcome::Outcome,
    registry::{KeyedLimiter, KeyedLimiterConfig},
    sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper},
};
