//! Exercises the Redis backend across two independent client connections,
//! standing in for two separate process instances racing for one key.
//! Ignored by default; run with
//! `REDIS_URL=redis://... cargo test -p rt-lock --test redis_distributed -- --ignored`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rt_lock::{LockRegistry, RedisBackend};

#[tokio::test]
#[ignore]
async fn only_one_instance_holds_the_lock_at_a_time() {
    let Ok(url) = std::env::var("REDIS_URL") else {
        eprintln!("skipping: REDIS_URL not set");
        return;
    };

    let instance_a = LockRegistry::new(RedisBackend::connect(&url).await.unwrap(), Duration::from_secs(10));
    let instance_b = LockRegistry::new(RedisBackend::connect(&url).await.unwrap(), Duration::from_secs(10));

    let concurrent_holders = Arc::new(AtomicUsize::new(0));
    let max_concurrent = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for registry in [instance_a, instance_b] {
        let concurrent_holders = Arc::clone(&concurrent_holders);
        let max_concurrent = Arc::clone(&max_concurrent);
        handles.push(tokio::spawn(async move {
            for _ in 0..5 {
                let guard = registry.acquire("shared-resource", Duration::from_secs(5)).await.unwrap();
                let now = concurrent_holders.fetch_add(1, Ordering::SeqCst) + 1;
                max_concurrent.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                concurrent_holders.fetch_sub(1, Ordering::SeqCst);
                drop(guard);
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
}
