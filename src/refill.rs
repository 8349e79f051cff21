//! Background refill task.
//!
//! One task per bucket: sleep one interval, refill, repeat. Task granularity
//! is the failure-isolation boundary — if one key's task dies, every other
//! key keeps refilling.
//!
//! The task holds only a `Weak` reference to its bucket, so it cannot keep an
//! evicted bucket alive; it exits on its own once the bucket is dropped.
//! Cancellation is `JoinHandle::abort`: the task spends its life parked on
//! the sleep await point, so no refill lands after an abort.

use crate::bucket::TokenBucket;
use crate::sleeper::Sleeper;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Spawn the periodic refill task for `bucket` onto `runtime`.
///
/// The cadence comes from the bucket's own `refill_interval`; the `sleeper`
/// decides how that interval is waited out (tests inject fakes).
pub fn spawn_refill(
    runtime: &Handle,
    key: &str,
    bucket: &Arc<TokenBucket>,
    sleeper: Arc<dyn Sleeper>,
) -> JoinHandle<()> {
    let interval = bucket.config().refill_interval();
    let bucket: Weak<TokenBucket> = Arc::downgrade(bucket);
    let key = key.to_string();
    runtime.spawn(async move {
        loop {
            sleeper.sleep(interval).await;
            match bucket.upgrade() {
                Some(bucket) => bucket.refill(),
                None => {
                    tracing::debug!(
                        target: "tollgate::refill",
                        key = %key,
                        "bucket dropped, refill task exiting"
                    );
                    break;
                }
            }
        }
    })
}
