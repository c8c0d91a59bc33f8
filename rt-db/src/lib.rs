//! A `DbPool` component wrapping `sqlx::PgPool`, plus the `pg_advisory_lock`
//! primitive the task scheduler and the relational lock backend share.

mod error;
mod pool;

pub use error::DbError;
pub use pool::{AdvisoryLockGuard, DbPool};
