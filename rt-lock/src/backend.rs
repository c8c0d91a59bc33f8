use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::LockError;

/// The operation set every backend implements. `wait_for_signal` is a
/// best-effort wake-up hint; callers always retry `try_acquire` afterward,
/// so a spurious or missed wake only costs the 200ms poll fallback in
/// [`crate::registry::LockRegistry::acquire`], never correctness.
#[async_trait]
pub trait LockBackend: Send + Sync + std::fmt::Debug {
    async fn try_acquire(&self, key: &str, max_lock_time: Duration) -> Result<bool, LockError>;
    async fn release(&self, key: &str) -> Result<(), LockError>;
    async fn wait_for_signal(&self, key: &str, deadline: Instant);
}
