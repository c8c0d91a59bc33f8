//! FIFO wake-up and timeout behavior against the in-process backend, driven
//! purely through the public API (no external service required).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rt_lock::{InProcessBackend, LockRegistry};

#[tokio::test]
async fn timed_out_waiter_does_not_block_the_next_arrival() {
    let registry = LockRegistry::new(InProcessBackend::new(), Duration::from_secs(30));
    let held = registry.acquire("resource", Duration::from_secs(5)).await.unwrap();

    let timed_out = registry.acquire("resource", Duration::from_millis(30)).await;
    assert!(timed_out.is_err());

    drop(held);
    let acquired = registry.acquire("resource", Duration::from_millis(500)).await;
    assert!(acquired.is_ok());
}

#[tokio::test]
async fn scoped_lock_releases_on_body_completion() {
    let registry = LockRegistry::new(InProcessBackend::new(), Duration::from_secs(30));

    registry.lock("resource", Duration::from_secs(1), || async { 42 }).await.unwrap();

    let reacquired = registry.acquire("resource", Duration::from_millis(50)).await;
    assert!(reacquired.is_ok());
}

#[tokio::test]
async fn concurrent_waiters_enter_in_arrival_order() {
    let registry = LockRegistry::new(InProcessBackend::new(), Duration::from_secs(30));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let first = registry.acquire("resource", Duration::from_secs(1)).await.unwrap();

    let mut handles = Vec::new();
    for id in 0..4 {
        let registry = Arc::clone(&registry);
        let seen = Arc::clone(&seen);
        handles.push(tokio::spawn(async move {
            let guard = registry.acquire("resource", Duration::from_secs(2)).await.unwrap();
            seen.lock().unwrap().push(id);
            tokio::time::sleep(Duration::from_millis(5)).await;
            drop(guard);
        }));
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    drop(first);
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3]);
}
