#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database pool not yet prepared")]
    NotPrepared,
    #[error("advisory lock {0} timed out")]
    LockTimeout(i64),
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}
