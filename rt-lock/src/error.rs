#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("timed out waiting for lock {0:?}")]
    Timeout(String),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("database error: {0}")]
    Db(#[from] rt_db::DbError),
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}
