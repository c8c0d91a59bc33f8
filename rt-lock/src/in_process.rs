use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::backend::LockBackend;
use crate::error::LockError;

#[derive(Debug, Default)]
struct KeyState {
    held: AtomicBool,
    generation: AtomicU64,
    released: Notify,
}

/// A map key → wait-queue-of-futures backend: acquire wins immediately or
/// blocks on a per-key `Notify` until release or deadline.
#[derive(Debug, Default)]
pub struct InProcessBackend {
    keys: Mutex<HashMap<String, Arc<KeyState>>>,
}

impl InProcessBackend {
    pub fn new() -> Self {
        InProcessBackend::default()
    }

    fn state_for(&self, key: &str) -> Arc<KeyState> {
        Arc::clone(self.keys.lock().unwrap().entry(key.to_string()).or_default())
    }
}

#[async_trait]
impl LockBackend for InProcessBackend {
    async fn try_acquire(&self, key: &str, max_lock_time: Duration) -> Result<bool, LockError> {
        let state = self.state_for(key);
        if state.held.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        let generation = state.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let auto_release = Arc::clone(&state);
        tokio::spawn(async move {
            tokio::time::sleep(max_lock_time).await;
            if auto_release.generation.load(Ordering::SeqCst) == generation {
                auto_release.held.store(false, Ordering::SeqCst);
                auto_release.released.notify_waiters();
            }
        });
        Ok(true)
    }

    async fn release(&self, key: &str) -> Result<(), LockError> {
        let state = self.state_for(key);
        state.generation.fetch_add(1, Ordering::SeqCst);
        state.held.store(false, Ordering::SeqCst);
        state.released.notify_waiters();
        Ok(())
    }

    async fn wait_for_signal(&self, key: &str, deadline: Instant) {
        let state = self.state_for(key);
        let _ = tokio::time::timeout_at(deadline.into(), state.released.notified()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::LockRegistry;

    #[tokio::test]
    async fn second_acquirer_waits_for_first_release() {
        let registry = LockRegistry::new(InProcessBackend::new(), Duration::from_secs(30));
        let first = registry.acquire("k", Duration::from_secs(1)).await.unwrap();

        let registry2 = Arc::clone(&registry);
        let waiter = tokio::spawn(async move { registry2.acquire("k", Duration::from_secs(1)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(first);

        let second = waiter.await.unwrap();
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn acquire_times_out_when_never_released() {
        let registry = LockRegistry::new(InProcessBackend::new(), Duration::from_secs(30));
        let _held = registry.acquire("k", Duration::from_secs(1)).await.unwrap();

        let err = registry.acquire("k", Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, LockError::Timeout(_)));
    }

    #[tokio::test]
    async fn waiters_wake_in_arrival_order() {
        let registry = LockRegistry::new(InProcessBackend::new(), Duration::from_secs(30));
        let held = registry.acquire("k", Duration::from_secs(1)).await.unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut waiters = Vec::new();
        for i in 0..3 {
            let registry = Arc::clone(&registry);
            let order = Arc::clone(&order);
            waiters.push(tokio::spawn(async move {
                let guard = registry.acquire("k", Duration::from_secs(2)).await.unwrap();
                order.lock().unwrap().push(i);
                tokio::time::sleep(Duration::from_millis(5)).await;
                drop(guard);
            }));
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        drop(held);
        for w in waiters {
            w.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }
}
