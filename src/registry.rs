//! Keyed limiter registry: one token bucket per client key.
//!
//! Semantics:
//! - Buckets are created on first access per key; two racing first-accesses
//!   for the same key converge on a single bucket (creation happens under the
//!   map's write lock, behind a re-check).
//! - Each created bucket gets exactly one background refill task.
//! - The map lock guards only key resolution. Token counts are per-bucket
//!   atomics, so admission traffic on unrelated keys never serializes.
//! - With an idle TTL configured, a single reaper task removes entries whose
//!   last access is older than the TTL and aborts their refill tasks. Without
//!   one, the map grows with the key set — fine for small bounded key sets,
//!   a scaling limit otherwise.
//! - `shutdown` cancels every refill task plus the reaper; afterwards every
//!   operation reports `Failure("limiter shut down")`.
//!
//! Per key the lifecycle is: unseen → active (bucket + refill task) →
//! evicted → unseen. No other transitions.

use crate::bucket::{TokenBucket, TokenBucketConfig};
use crate::clock::{Clock, MonotonicClock};
use crate::error::LimiterError;
use crate::outcome::Outcome;
use crate::refill;
use crate::sleeper::{Sleeper, TokioSleeper};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

const SHUT_DOWN_REASON: &str = "limiter shut down";

/// Validated configuration for a [`KeyedLimiter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedLimiterConfig {
    bucket: TokenBucketConfig,
    idle_ttl: Option<Duration>,
}

impl KeyedLimiterConfig {
    /// Configuration applying `bucket` per key, with no idle eviction.
    pub fn new(bucket: TokenBucketConfig) -> Self {
        Self { bucket, idle_ttl: None }
    }

    /// Enable idle eviction: keys untouched for `ttl` are removed and their
    /// refill tasks cancelled.
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Result<Self, LimiterError> {
        if ttl.is_zero() {
            return Err(LimiterError::InvalidIdleTtl(ttl));
        }
        self.idle_ttl = Some(ttl);
        Ok(self)
    }

    /// Per-key bucket configuration.
    pub fn bucket(&self) -> &TokenBucketConfig {
        &self.bucket
    }

    /// Idle TTL, if eviction is enabled.
    pub fn idle_ttl(&self) -> Option<Duration> {
        self.idle_ttl
    }
}

#[derive(Debug)]
struct KeyEntry {
    bucket: Arc<TokenBucket>,
    refill_task: JoinHandle<()>,
    last_access_millis: AtomicU64,
}

#[derive(Debug)]
struct Shared {
    entries: RwLock<HashMap<String, KeyEntry>>,
    closed: AtomicBool,
}

/// Process-wide registry handing out one [`TokenBucket`] per key.
///
/// Must be created inside a tokio runtime (refill tasks are spawned onto the
/// runtime that was current at construction; `try_take` itself may then be
/// called from any thread).
///
/// ```rust
/// use std::time::Duration;
/// use tollgate::{KeyedLimiter, KeyedLimiterConfig, TokenBucketConfig};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let bucket = TokenBucketConfig::new(5, 5, Duration::from_millis(500)).unwrap();
/// let limiter = KeyedLimiter::new(KeyedLimiterConfig::new(bucket));
///
/// for _ in 0..5 {
///     assert!(limiter.try_take("client-1").granted());
/// }
/// assert!(!limiter.try_take("client-1").granted()); // exhausted
/// assert!(limiter.try_take("client-2").granted());  // independent key
/// limiter.shutdown();
/// # });
/// ```
#[derive(Debug)]
pub struct KeyedLimiter {
    shared: Arc<Shared>,
    config: KeyedLimiterConfig,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    runtime: Handle,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl KeyedLimiter {
    /// Create a registry with the production clock and sleeper.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime (same contract as
    /// `tokio::spawn`).
    pub fn new(config: KeyedLimiterConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                entries: RwLock::new(HashMap::new()),
                closed: AtomicBool::new(false),
            }),
            config,
            clock: Arc::new(MonotonicClock::default()),
            sleeper: Arc::new(TokioSleeper),
            runtime: Handle::current(),
            reaper: Mutex::new(None),
        }
    }

    /// Replace the clock (for tests). Call before first use.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the sleeper driving refill and reaper cadence (for tests).
    /// Call before first use.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Attempt to take one token for `key`, creating its bucket on first
    /// access.
    ///
    /// Non-blocking. `Success(true)` grants, `Success(false)` means the
    /// key's bucket is exhausted, `Failure` means the registry is shut down.
    pub fn try_take(&self, key: &str) -> Outcome<bool> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Outcome::failure(SHUT_DOWN_REASON);
        }
        let now = self.clock.now_millis();
        {
            let entries = self.read_entries();
            if let Some(entry) = entries.get(key) {
                entry.last_access_millis.store(now, Ordering::Relaxed);
                return entry.bucket.try_take();
            }
        }
        match self.ensure_entry(key, now) {
            Some(bucket) => bucket.try_take(),
            None => Outcome::failure(SHUT_DOWN_REASON),
        }
    }

    /// Ensure `key` has a bucket with a scheduled refill task.
    ///
    /// Idempotent: a second call for a live key changes nothing. Entries
    /// created by `try_take` already have their task scheduled, so calling
    /// this is only needed to pre-warm keys ahead of traffic.
    pub fn start_refill(&self, key: &str) -> Outcome<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Outcome::failure(SHUT_DOWN_REASON);
        }
        match self.ensure_entry(key, self.clock.now_millis()) {
            Some(_) => Outcome::success(()),
            None => Outcome::failure(SHUT_DOWN_REASON),
        }
    }

    /// The live bucket for `key`, if one exists.
    pub fn bucket(&self, key: &str) -> Option<Arc<TokenBucket>> {
        let entries = self.read_entries();
        entries.get(key).map(|entry| entry.bucket.clone())
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    /// Whether any keys are live.
    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    /// Run one eviction pass, removing keys idle beyond the configured TTL.
    ///
    /// Returns the number of evicted keys. No-op when eviction is disabled.
    /// The background reaper calls this on its own tick; exposing it lets
    /// hosts trigger a sweep at moments of their choosing.
    pub fn evict_idle(&self) -> usize {
        let Some(ttl) = self.config.idle_ttl else { return 0 };
        sweep_idle(&self.shared, self.clock.now_millis(), ttl)
    }

    /// Shut the registry down: cancel every refill task and the reaper,
    /// drop all buckets.
    ///
    /// Idempotent. Subsequent operations report `Failure`.
    pub fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(reaper) = self.reaper.lock().expect("limiter registry poisoned").take() {
            reaper.abort();
        }
        let mut entries = self.shared.entries.write().expect("limiter registry poisoned");
        let drained = entries.len();
        for (_, entry) in entries.drain() {
            entry.refill_task.abort();
        }
        tracing::debug!(target: "tollgate::registry", keys = drained, "limiter shut down");
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, KeyEntry>> {
        self.shared.entries.read().expect("limiter registry poisoned")
    }

    /// Resolve or create the entry for `key`. Returns `None` if the registry
    /// shut down. Creation is atomic with respect to other first-accesses:
    /// the re-check under the write lock guarantees one bucket per key.
    fn ensure_entry(&self, key: &str, now: u64) -> Option<Arc<TokenBucket>> {
        let bucket = {
            let mut entries = self.shared.entries.write().expect("limiter registry poisoned");
            if self.shared.closed.load(Ordering::Acquire) {
                return None;
            }
            if let Some(entry) = entries.get(key) {
                entry.last_access_millis.store(now, Ordering::Relaxed);
                return Some(entry.bucket.clone());
            }
            let bucket = Arc::new(TokenBucket::new(self.config.bucket.clone()));
            let refill_task =
                refill::spawn_refill(&self.runtime, key, &bucket, self.sleeper.clone());
            entries.insert(
                key.to_string(),
                KeyEntry {
                    bucket: bucket.clone(),
                    refill_task,
                    last_access_millis: AtomicU64::new(now),
                },
            );
            tracing::debug!(target: "tollgate::registry", key = %key, "bucket created");
            bucket
        };
        self.ensure_reaper();
        Some(bucket)
    }

    /// Spawn the reaper once, lazily, when eviction is enabled and the first
    /// key appears.
    fn ensure_reaper(&self) {
        let Some(ttl) = self.config.idle_ttl else { return };
        let mut guard = self.reaper.lock().expect("limiter registry poisoned");
        if guard.is_some() {
            return;
        }
        let shared = Arc::downgrade(&self.shared);
        let clock = self.clock.clone();
        let sleeper = self.sleeper.clone();
        *guard = Some(self.runtime.spawn(async move {
            loop {
                sleeper.sleep(ttl).await;
                let Some(shared) = shared.upgrade() else { break };
                sweep_idle(&shared, clock.now_millis(), ttl);
            }
        }));
    }
}

impl Drop for KeyedLimiter {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        if let Ok(mut guard) = self.reaper.lock() {
            if let Some(reaper) = guard.take() {
                reaper.abort();
            }
        }
        if let Ok(mut entries) = self.shared.entries.write() {
            for (_, entry) in entries.drain() {
                entry.refill_task.abort();
            }
        }
    }
}

fn sweep_idle(shared: &Shared, now: u64, ttl: Duration) -> usize {
    let ttl_millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    let mut entries = shared.entries.write().expect("limiter registry poisoned");
    let mut evicted = 0usize;
    entries.retain(|key, entry| {
        let idle = now.saturating_sub(entry.last_access_millis.load(Ordering::Relaxed));
        if idle > ttl_millis {
            entry.refill_task.abort();
            tracing::debug!(
                target: "tollgate::registry",
                key = %key,
                idle_millis = idle,
                "idle key evicted"
            );
            evicted += 1;
            false
        } else {
            true
        }
    });
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(capacity: u64) -> KeyedLimiterConfig {
        KeyedLimiterConfig::new(
            TokenBucketConfig::new(capacity, capacity, Duration::from_millis(500))
                .expect("valid config"),
        )
    }

    #[test]
    fn rejects_zero_idle_ttl() {
        let err = config(1)
            .with_idle_ttl(Duration::ZERO)
            .expect_err("zero ttl should be invalid");
        assert!(matches!(err, LimiterError::InvalidIdleTtl(Duration::ZERO)));
    }

    #[tokio::test]
    async fn creates_bucket_on_first_access() {
        let limiter = KeyedLimiter::new(config(3));
        assert!(limiter.is_empty());
        assert!(limiter.try_take("k1").granted());
        assert_eq!(limiter.len(), 1);
        assert!(limiter.bucket("k1").is_some());
        assert!(limiter.bucket("k2").is_none());
        limiter.shutdown();
    }

    #[tokio::test]
    async fn same_key_resolves_to_same_bucket() {
        let limiter = KeyedLimiter::new(config(3));
        let _ = limiter.try_take("k1");
        let first = limiter.bucket("k1").expect("bucket present");
        let _ = limiter.try_take("k1");
        let second = limiter.bucket("k1").expect("bucket present");
        assert!(Arc::ptr_eq(&first, &second), "one bucket per key");
        limiter.shutdown();
    }

    #[tokio::test]
    async fn keys_are_isolated() {
        let limiter = KeyedLimiter::new(config(1));
        assert!(limiter.try_take("a").granted());
        assert!(!limiter.try_take("a").granted(), "a is exhausted");
        assert!(limiter.try_take("b").granted(), "b unaffected by a");
        limiter.shutdown();
    }

    #[tokio::test]
    async fn start_refill_is_idempotent() {
        let limiter = KeyedLimiter::new(config(2));
        assert!(limiter.start_refill("k1").is_success());
        let first = limiter.bucket("k1").expect("bucket present");
        assert!(limiter.start_refill("k1").is_success());
        let second = limiter.bucket("k1").expect("bucket present");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(limiter.len(), 1);
        limiter.shutdown();
    }

    #[tokio::test]
    async fn shutdown_fails_subsequent_operations() {
        let limiter = KeyedLimiter::new(config(2));
        assert!(limiter.try_take("k1").granted());
        limiter.shutdown();
        assert!(limiter.is_empty());

        let outcome = limiter.try_take("k1");
        assert_eq!(outcome.reason(), Some(SHUT_DOWN_REASON));
        assert!(limiter.start_refill("k2").is_failure());
        // idempotent
        limiter.shutdown();
    }

    #[tokio::test]
    async fn bucket_creation_is_logged() {
        use tracing_subscriber::fmt::writer::BoxMakeWriter;
        use tracing_subscriber::fmt::MakeWriter;

        #[derive(Clone)]
        struct SharedWriter(Arc<Mutex<Vec<u8>>>);

        impl<'a> MakeWriter<'a> for SharedWriter {
            type Writer = SharedGuard;
            fn make_writer(&'a self) -> Self::Writer {
                SharedGuard(self.0.clone())
            }
        }

        struct SharedGuard(Arc<Mutex<Vec<u8>>>);
        impl std::io::Write for SharedGuard {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                let mut guard = self.0.lock().unwrap();
                guard.extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let writer = SharedWriter(buffer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_writer(BoxMakeWriter::new(writer))
            .with_max_level(tracing::Level::DEBUG)
            .with_target(true)
            .without_time()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let limiter = KeyedLimiter::new(config(2));
        let _ = limiter.try_take("logged-key");
        limiter.shutdown();

        let logs = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("bucket created"), "creation should be logged");
        assert!(logs.contains("logged-key"));
        assert!(logs.contains("limiter shut down"), "shutdown should be logged");
    }

    #[tokio::test]
    async fn evict_idle_without_ttl_is_a_no_op() {
        let limiter = KeyedLimiter::new(config(2));
        let _ = limiter.try_take("k1");
        assert_eq!(limiter.evict_idle(), 0);
        assert_eq!(limiter.len(), 1);
        limiter.shutdown();
    }
}
