//! Clock abstraction used for idle-eviction bookkeeping.
//!
//! The registry stamps each key's last access with `Clock::now_millis` and the
//! reaper compares those stamps against the idle TTL. Injecting a fake clock
//! makes eviction testable without waiting out real TTLs.

use std::time::Instant;

/// Clock abstraction so timing can be faked in tests.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Milliseconds elapsed on this clock's timeline.
    fn now_millis(&self) -> u64;
}

/// Monotonic clock backed by `Instant::now()`.
///
/// Notes: the timeline starts at clock construction and resets with the
/// process; idle stamps are only ever compared within one process lifetime,
/// which is all the registry needs.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self { start: Instant::now() }
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
