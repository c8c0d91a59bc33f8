use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use crate::backend::LockBackend;
use crate::error::LockError;

/// Per-key FIFO queue of local waiters, shared by every backend so that
/// arrival order is honored the same way regardless of which backend
/// actually holds the lock.
#[derive(Debug, Default)]
struct Queues {
    by_key: HashMap<String, VecDeque<Arc<Notify>>>,
}

impl Queues {
    fn enqueue(&mut self, key: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.by_key.entry(key.to_string()).or_default().push_back(notify.clone());
        notify
    }

    fn is_front(&self, key: &str, notify: &Arc<Notify>) -> bool {
        self.by_key.get(key).and_then(|q| q.front()).map(|front| Arc::ptr_eq(front, notify)).unwrap_or(false)
    }

    /// Removes `notify` from `key`'s queue, wherever it sits, and wakes the
    /// new front (if the removed entry was it) so the next waiter gets its
    /// turn to attempt `try_acquire`.
    fn remove(&mut self, key: &str, notify: &Arc<Notify>) {
        if let Some(queue) = self.by_key.get_mut(key) {
            let was_front = queue.front().map(|f| Arc::ptr_eq(f, notify)).unwrap_or(false);
            queue.retain(|n| !Arc::ptr_eq(n, notify));
            if was_front {
                if let Some(new_front) = queue.front() {
                    new_front.notify_one();
                }
            }
            if queue.is_empty() {
                self.by_key.remove(key);
            }
        }
    }
}

/// Generic FIFO lock manager over any [`LockBackend`]: `acquire`, `release`,
/// and a scoped `lock` that releases automatically when the returned guard
/// drops.
#[derive(Debug)]
pub struct LockRegistry<B: LockBackend> {
    backend: Arc<B>,
    max_lock_time: Duration,
    queues: Mutex<Queues>,
}

impl<B: LockBackend + 'static> LockRegistry<B> {
    pub fn new(backend: B, max_lock_time: Duration) -> Arc<Self> {
        Arc::new(LockRegistry { backend: Arc::new(backend), max_lock_time, queues: Mutex::new(Queues::default()) })
    }

    pub async fn acquire(self: &Arc<Self>, key: &str, timeout: Duration) -> Result<LockGuard<B>, LockError> {
        let deadline = Instant::now() + timeout;
        let my_notify = self.queues.lock().unwrap().enqueue(key);

        loop {
            if self.queues.lock().unwrap().is_front(key, &my_notify) {
                if self.backend.try_acquire(key, self.max_lock_time).await? {
                    self.queues.lock().unwrap().remove(key, &my_notify);
                    return Ok(LockGuard { registry: Arc::clone(self), key: key.to_string() });
                }
            }

            let now = Instant::now();
            if now >= deadline {
                self.queues.lock().unwrap().remove(key, &my_notify);
                return Err(LockError::Timeout(key.to_string()));
            }

            let poll_fallback = (deadline - now).min(Duration::from_millis(200));
            tokio::select! {
                _ = my_notify.notified() => {}
                _ = self.backend.wait_for_signal(key, deadline) => {}
                _ = tokio::time::sleep(poll_fallback) => {}
            }
        }
    }

    /// Acquires `key`, runs `body`, and releases on any exit path (success,
    /// error, or panic unwinding through the guard's `Drop`).
    pub async fn lock<F, Fut, T>(self: &Arc<Self>, key: &str, timeout: Duration, body: F) -> Result<T, LockError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let _guard = self.acquire(key, timeout).await?;
        Ok(body().await)
    }

    async fn release(&self, key: &str) {
        if let Err(err) = self.backend.release(key).await {
            tracing::warn!(key, error = %err, "lock release failed");
        }
    }
}

/// Held while a key is locked; releases on drop via a spawned task (the
/// backend call is async, `Drop` is not).
#[derive(Debug)]
pub struct LockGuard<B: LockBackend + 'static> {
    registry: Arc<LockRegistry<B>>,
    key: String,
}

impl<B: LockBackend + 'static> Drop for LockGuard<B> {
    fn drop(&mut self) {
        let registry = Arc::clone(&self.registry);
        let key = std::mem::take(&mut self.key);
        tokio::spawn(async move {
            registry.release(&key).await;
        });
    }
}
