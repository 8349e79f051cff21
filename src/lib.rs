#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Tollgate
//!
//! Keyed token-bucket rate limiting for async Rust.
//!
//! ## Features
//!
//! - **Token buckets** with a lock-free, CAS-updated counter: `try_take`
//!   never blocks and never over-admits
//! - **Per-key buckets** created on demand, with race-free first access
//! - **Background refill** driven by one tokio task per key
//! - **Idle eviction** (opt-in TTL) so the key set stays bounded
//! - **Outcomes as values**: denial is data, not an error
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use tollgate::{KeyedLimiter, KeyedLimiterConfig, TokenBucketConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let bucket = TokenBucketConfig::new(100, 10, Duration::from_secs(1))
//!         .expect("valid config");
//!     let limiter = KeyedLimiter::new(KeyedLimiterConfig::new(bucket));
//!
//!     if limiter.try_take("client-42").granted() {
//!         // admit the request
//!     } else {
//!         // deny: exhausted (or limiter shut down)
//!     }
//!     limiter.shutdown();
//! }
//! ```

pub mod bucket;
pub mod clock;
pub mod error;
pub mod outcome;
pub mod prelude;
pub mod refill;
pub mod registry;
pub mod sleeper;

// Re-exports
pub use bucket::{TokenBucket, TokenBucketConfig};
pub use clock::{Clock, MonotonicClock};
pub use error::LimiterError;
pub use outcome::Outcome;
pub use registry::{KeyedLimiter, KeyedLimiterConfig};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
