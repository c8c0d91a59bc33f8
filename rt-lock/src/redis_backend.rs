use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use crate::backend::LockBackend;
use crate::error::LockError;

fn lock_key(key: &str) -> String {
    format!("rt-lock:{key}")
}

fn channel(key: &str) -> String {
    format!("rt-lock:released:{key}")
}

/// `SET key 1 PX <max_lock_time> NX` for the winner; release does `DEL` +
/// `PUBLISH`. Losers subscribe to the release channel on a dedicated
/// connection (reconnecting fresh on every wait, so a dropped connection
/// only costs one poll cycle rather than wedging the waiter).
pub struct RedisBackend {
    client: redis::Client,
    conn: Mutex<MultiplexedConnection>,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend").finish()
    }
}

impl RedisBackend {
    pub async fn connect(url: &str) -> Result<Self, LockError> {
        let client = redis::Client::open(url).map_err(LockError::Redis)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(RedisBackend { client, conn: Mutex::new(conn) })
    }
}

#[async_trait]
impl LockBackend for RedisBackend {
    async fn try_acquire(&self, key: &str, max_lock_time: Duration) -> Result<bool, LockError> {
        let mut conn = self.conn.lock().await;
        let won: Option<String> = conn
            .set_options(
                lock_key(key),
                1,
                redis::SetOptions::default()
                    .conditional_set(redis::ExistenceCheck::NX)
                    .with_expiration(redis::SetExpiry::PX(max_lock_time.as_millis() as u64)),
            )
            .await?;
        Ok(won.is_some())
    }

    async fn release(&self, key: &str) -> Result<(), LockError> {
        let mut conn = self.conn.lock().await;
        let _: () = conn.del(lock_key(key)).await?;
        let _: () = conn.publish(channel(key), "released").await?;
        Ok(())
    }

    async fn wait_for_signal(&self, key: &str, deadline: Instant) {
        let Ok(mut pubsub) = self.client.get_async_pubsub().await else { return };
        if pubsub.subscribe(channel(key)).await.is_err() {
            return;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        let mut stream = pubsub.into_on_message();
        let _ = tokio::time::timeout(remaining, stream.next()).await;
    }
}
