//! Distributed locking with one FIFO contract shared across three
//! backends: in-process, Redis, and relational (Postgres advisory locks).

mod backend;
mod error;
mod in_process;
mod redis_backend;
mod registry;
mod relational;

pub use backend::LockBackend;
pub use error::LockError;
pub use in_process::InProcessBackend;
pub use redis_backend::RedisBackend;
pub use registry::{LockGuard, LockRegistry};
pub use relational::RelationalBackend;
