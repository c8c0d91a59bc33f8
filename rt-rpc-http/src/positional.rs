//! Positional REST-style RPC: `POST {base}/{method}[/]`, a bare JSON object
//! of parameters in, a bare result or `{error:{...}}` out.

use rt_rpc::{CallArgs, MethodRegistry, RpcError};
use serde_json::Value as Json;

pub struct PositionalResponse {
    pub status: u16,
    pub body: Json,
}

/// `path` is the method name already stripped of `{base}/` and any trailing
/// slash. `body` is the raw request bytes, expected to decode to a JSON object.
pub async fn handle(registry: &MethodRegistry, method: &str, body: &[u8]) -> PositionalResponse {
    let args = if body.is_empty() {
        CallArgs::None
    } else {
        match serde_json::from_slice::<Json>(body) {
            Ok(Json::Object(map)) => CallArgs::Named(map),
            Ok(_) => return error_response(&RpcError::InvalidArguments("request body must be a JSON object".to_string())),
            Err(e) => return error_response(&RpcError::ParseError(e.to_string())),
        }
    };

    match registry.exec(method, args).await {
        Ok(result) => PositionalResponse { status: 200, body: result },
        Err(err) => error_response(&err),
    }
}

fn error_response(err: &RpcError) -> PositionalResponse {
    PositionalResponse {
        status: err.http_status(),
        body: serde_json::json!({"error": {"code": err.code(), "message": err.to_string(), "data": err.data()}}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rt_rpc::{ParamSpec, RpcMethod, RpcValue};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn registry() -> MethodRegistry {
        let mut registry = MethodRegistry::new();
        registry.register(
            RpcMethod::new(
                "echo",
                Arc::new(|args: BTreeMap<String, RpcValue>| async move {
                    Ok(args.get("value").cloned().unwrap_or(RpcValue::Null))
                }),
            )
            .with_params(vec![ParamSpec::required("value")]),
        );
        registry
    }

    #[tokio::test]
    async fn success_returns_bare_result() {
        let response = handle(&registry(), "echo", br#"{"value":"hi"}"#).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, serde_json::json!("hi"));
    }

    #[tokio::test]
    async fn unknown_method_maps_to_404() {
        let response = handle(&registry(), "missing", b"{}").await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn non_object_body_is_invalid_arguments() {
        let response = handle(&registry(), "echo", b"[1,2,3]").await;
        assert_eq!(response.status, 400);
    }
}
