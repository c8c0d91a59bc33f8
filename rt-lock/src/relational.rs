use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rt_db::DbPool;
use sha2::{Digest, Sha256};
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgListener;
use sqlx::Postgres;
use tokio::sync::Mutex;

use crate::backend::LockBackend;
use crate::error::LockError;

const RELEASE_CHANNEL: &str = "rt_lock_release";

/// Hashes an arbitrary string key into the 64-bit id space
/// `pg_advisory_lock` takes, using the first 8 bytes of its SHA-256 digest.
fn lock_id(key: &str) -> i64 {
    let digest = Sha256::digest(key.as_bytes());
    i64::from_be_bytes(digest[..8].try_into().expect("sha256 digest is at least 8 bytes"))
}

/// Advisory locks are session-scoped: the connection that acquires one must
/// be the same connection that releases it, so a held lock's connection is
/// checked out of the pool for the acquisition's entire lifetime rather than
/// returned between the try-acquire and release calls.
pub struct RelationalBackend {
    pool: Arc<DbPool>,
    held: Mutex<HashMap<String, PoolConnection<Postgres>>>,
    listener: Mutex<Option<PgListener>>,
}

impl std::fmt::Debug for RelationalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationalBackend").finish()
    }
}

impl RelationalBackend {
    pub async fn new(pool: Arc<DbPool>) -> Result<Self, LockError> {
        let listener = PgListener::connect(pool.dsn()).await?;
        Ok(RelationalBackend { pool, held: Mutex::new(HashMap::new()), listener: Mutex::new(Some(listener)) })
    }
}

#[async_trait]
impl LockBackend for RelationalBackend {
    async fn try_acquire(&self, key: &str, _max_lock_time: Duration) -> Result<bool, LockError> {
        let pool = self.pool.pool()?;
        let mut conn = pool.acquire().await?;
        let id = lock_id(key);
        let (acquired,): (bool,) =
            sqlx::query_as("SELECT pg_try_advisory_lock($1)").bind(id).fetch_one(&mut *conn).await?;
        if acquired {
            self.held.lock().await.insert(key.to_string(), conn);
        }
        Ok(acquired)
    }

    async fn release(&self, key: &str) -> Result<(), LockError> {
        let Some(mut conn) = self.held.lock().await.remove(key) else {
            return Ok(());
        };
        let id = lock_id(key);
        let _: (bool,) = sqlx::query_as("SELECT pg_advisory_unlock($1)").bind(id).fetch_one(&mut *conn).await?;
        sqlx::query("SELECT pg_notify($1, $2)").bind(RELEASE_CHANNEL).bind(key).execute(&mut *conn).await?;
        Ok(())
    }

    async fn wait_for_signal(&self, key: &str, deadline: Instant) {
        let mut guard = self.listener.lock().await;
        let Some(listener) = guard.as_mut() else { return };
        if listener.listen(RELEASE_CHANNEL).await.is_err() {
            return;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        let _ = tokio::time::timeout(remaining, async {
            loop {
                match listener.recv().await {
                    Ok(note) if note.payload() == key => break,
                    Ok(_) => continue,
                    Err(_) => break,
                }
            }
        })
        .await;
        let _ = listener.unlisten(RELEASE_CHANNEL).await;
    }
}
