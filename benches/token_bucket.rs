use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;
use tollgate::{KeyedLimiter, KeyedLimiterConfig, TokenBucket, TokenBucketConfig};

fn take_hot_path(c: &mut Criterion) {
    // Huge capacity so the bench measures the CAS fast path, not denials.
    let config =
        TokenBucketConfig::new(u64::MAX / 2, 1, Duration::from_secs(1)).unwrap();
    let bucket = TokenBucket::new(config);

    c.bench_function("bucket_try_take_granted", |b| {
        b.iter(|| black_box(bucket.try_take()));
    });
}

fn take_exhausted(c: &mut Criterion) {
    let config = TokenBucketConfig::new(1, 1, Duration::from_secs(1)).unwrap();
    let bucket = TokenBucket::new(config);
    let _ = bucket.try_take();

    c.bench_function("bucket_try_take_denied", |b| {
        b.iter(|| black_box(bucket.try_take()));
    });
}

fn registry_resolved_key(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let config = KeyedLimiterConfig::new(
        TokenBucketConfig::new(u64::MAX / 2, 1, Duration::from_secs(3600)).unwrap(),
    );
    let limiter = rt.block_on(async { KeyedLimiter::new(config) });
    let _ = limiter.try_take("bench-key"); // warm the entry

    c.bench_function("registry_try_take_existing_key", |b| {
        b.iter(|| black_box(limiter.try_take(black_box("bench-key"))));
    });

    limiter.shutdown();
}

criterion_group!(benches, take_hot_path, take_exhausted, registry_resolved_key);
criterion_main!(benches);
