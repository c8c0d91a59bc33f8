//! The JSON-RPC 2.0 request/response envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Json>,
    #[serde(default)]
    pub id: Option<Json>,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Json>,
}

impl From<&rt_rpc::RpcError> for JsonRpcError {
    fn from(err: &rt_rpc::RpcError) -> Self {
        JsonRpcError { code: err.code(), message: canonical_message(err), data: err.data().cloned() }
    }
}

/// JSON-RPC 2.0 reserves fixed `message` text for each standard error code;
/// only implementation-defined codes (`ServerError`, `UserDefined`) carry a
/// caller-supplied message.
fn canonical_message(err: &rt_rpc::RpcError) -> String {
    match err {
        rt_rpc::RpcError::ParseError(_) => "Parse error".to_string(),
        rt_rpc::RpcError::InvalidRequest(_) => "Invalid Request".to_string(),
        rt_rpc::RpcError::MethodNotFound(_) => "Method not found".to_string(),
        rt_rpc::RpcError::InvalidArguments(_) => "Invalid params".to_string(),
        rt_rpc::RpcError::InternalError(_) => "Internal error".to_string(),
        rt_rpc::RpcError::ServerError(_) | rt_rpc::RpcError::UserDefined { .. } => err.to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Json,
}

impl JsonRpcResponse {
    pub fn ok(id: Json, result: Json) -> Self {
        JsonRpcResponse { jsonrpc: "2.0", result: Some(result), error: None, id }
    }

    pub fn err(id: Json, error: &rt_rpc::RpcError) -> Self {
        JsonRpcResponse { jsonrpc: "2.0", result: None, error: Some(error.into()), id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_error_codes_carry_their_canonical_message() {
        let cases: Vec<(rt_rpc::RpcError, &str)> = vec![
            (rt_rpc::RpcError::ParseError("bad json".to_string()), "Parse error"),
            (rt_rpc::RpcError::InvalidRequest("missing method".to_string()), "Invalid Request"),
            (rt_rpc::RpcError::MethodNotFound("foo".to_string()), "Method not found"),
            (rt_rpc::RpcError::InvalidArguments("id required".to_string()), "Invalid params"),
            (rt_rpc::RpcError::InternalError("boom".to_string()), "Internal error"),
        ];
        for (err, expected) in cases {
            let jsonrpc_err: JsonRpcError = (&err).into();
            assert_eq!(jsonrpc_err.message, expected, "wrong canonical message for {err:?}");
        }
    }

    #[test]
    fn server_defined_errors_keep_their_own_message() {
        let err = rt_rpc::RpcError::ServerError("disk full".to_string());
        let jsonrpc_err: JsonRpcError = (&err).into();
        assert_eq!(jsonrpc_err.message, err.to_string());
    }
}
