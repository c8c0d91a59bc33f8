use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rt_core::Component;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::DbError;

/// Owns a `sqlx::PgPool` and registers with the orchestrator like any other
/// component. The scheduler and the relational lock backend both depend on
/// this rather than opening their own pools.
#[derive(Debug)]
pub struct DbPool {
    dsn: String,
    max_connections: u32,
    pool: RwLock<Option<PgPool>>,
}

impl DbPool {
    pub fn new(dsn: impl Into<String>, max_connections: u32) -> Self {
        DbPool { dsn: dsn.into(), max_connections, pool: RwLock::new(None) }
    }

    pub fn pool(&self) -> Result<PgPool, DbError> {
        self.pool.read().unwrap().clone().ok_or(DbError::NotPrepared)
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    /// Tries `pg_try_advisory_lock(id)` on its own dedicated connection
    /// (advisory locks are session-scoped, so the connection and the guard
    /// share one lifetime) until it succeeds or `timeout` elapses. This is
    /// the relational backend's "try-advisory-lock-with-timeout" primitive.
    pub async fn advisory_lock(&self, id: i64, timeout: Duration) -> Result<AdvisoryLockGuard, DbError> {
        let pool = self.pool()?;
        let mut conn = pool.acquire().await?;
        let deadline = Instant::now() + timeout;
        loop {
            let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
                .bind(id)
                .fetch_one(&mut *conn)
                .await?;
            if acquired.0 {
                return Ok(AdvisoryLockGuard { id, conn: Some(conn) });
            }
            if Instant::now() >= deadline {
                return Err(DbError::LockTimeout(id));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

/// Releases the advisory lock (`pg_advisory_unlock`) when dropped. The
/// connection is held for the guard's entire lifetime, matching advisory
/// locks' session scoping.
pub struct AdvisoryLockGuard {
    id: i64,
    conn: Option<sqlx::pool::PoolConnection<sqlx::Postgres>>,
}

impl Drop for AdvisoryLockGuard {
    fn drop(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            let id = self.id;
            tokio::spawn(async move {
                let _: Result<(bool,), _> =
                    sqlx::query_as("SELECT pg_advisory_unlock($1)").bind(id).fetch_one(&mut *conn).await;
            });
        }
    }
}

#[async_trait]
impl Component for DbPool {
    async fn prepare(&self) -> Result<(), anyhow::Error> {
        let pool = PgPoolOptions::new().max_connections(self.max_connections).connect(&self.dsn).await?;
        *self.pool.write().unwrap() = Some(pool);
        Ok(())
    }

    async fn stop(&self) {
        let pool = self.pool.write().unwrap().take();
        if let Some(pool) = pool {
            pool.close().await;
        }
    }

    async fn health(&self) -> Result<(), anyhow::Error> {
        let pool = self.pool()?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_reports_not_prepared_before_prepare_runs() {
        let db = DbPool::new("postgres://localhost/test", 4);
        assert!(matches!(db.pool(), Err(DbError::NotPrepared)));
    }
}
