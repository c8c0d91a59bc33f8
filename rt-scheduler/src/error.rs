#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("task {0} not found")]
    NotFound(i64),
    #[error("persisted trace context on the task row is incomplete or unparseable")]
    TracePropagationUnsupported,
}

/// Raised by a task body to explicitly request the retry path rather than
/// the terminal `error` state a returned `RpcError` would produce.
#[derive(Debug, Clone)]
pub struct Retry(pub String);

impl std::fmt::Display for Retry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "retry requested: {}", self.0)
    }
}

/// The sentinel `RpcError::UserDefined` code a task handler returns to
/// signal [`Retry`] through the ordinary `RpcError` channel, since the RPC
/// engine itself has no notion of a scheduler-specific control-flow signal.
pub const RETRY_SENTINEL_CODE: i64 = -900_001;

pub fn retry(cause: impl Into<String>) -> rt_rpc::RpcError {
    rt_rpc::RpcError::UserDefined { code: RETRY_SENTINEL_CODE, message: cause.into(), data: None }
}

pub fn as_retry(err: &rt_rpc::RpcError) -> Option<Retry> {
    match err {
        rt_rpc::RpcError::UserDefined { code, message, .. } if *code == RETRY_SENTINEL_CODE => {
            Some(Retry(message.clone()))
        }
        _ => None,
    }
}
