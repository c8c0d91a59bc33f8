/// The §4.5 error taxonomy: kinds, not type names, each mapping to both a
/// JSON-RPC numeric code and an HTTP status the positional-RPC transport uses.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RpcError {
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("method not found: {0}")]
    MethodNotFound(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("internal error: {0}")]
    InternalError(String),
    #[error("server error: {0}")]
    ServerError(String),
    #[error("{message}")]
    UserDefined { code: i64, message: String, data: Option<serde_json::Value> },
}

impl RpcError {
    /// JSON-RPC 2.0 `error.code`.
    pub fn code(&self) -> i64 {
        match self {
            RpcError::ParseError(_) => -32700,
            RpcError::InvalidRequest(_) => -32600,
            RpcError::MethodNotFound(_) => -32601,
            RpcError::InvalidArguments(_) => -32602,
            RpcError::InternalError(_) => -32603,
            RpcError::ServerError(_) => -32000,
            RpcError::UserDefined { code, .. } => *code,
        }
    }

    /// HTTP status the positional-RPC transport mirrors.
    pub fn http_status(&self) -> u16 {
        match self {
            RpcError::ParseError(_) | RpcError::InvalidRequest(_) | RpcError::InvalidArguments(_) => 400,
            RpcError::MethodNotFound(_) => 404,
            RpcError::InternalError(_) | RpcError::ServerError(_) => 500,
            RpcError::UserDefined { code, .. } => {
                if (400..=599).contains(code) {
                    *code as u16
                } else {
                    200
                }
            }
        }
    }

    pub fn data(&self) -> Option<&serde_json::Value> {
        match self {
            RpcError::UserDefined { data, .. } => data.as_ref(),
            _ => None,
        }
    }

    /// Any uncaught error from a handler becomes a `ServerError` carrying the
    /// original as its message, per §4.5 step 5.
    pub fn from_handler_panic(source: impl std::fmt::Display) -> Self {
        RpcError::ServerError(source.to_string())
    }
}
