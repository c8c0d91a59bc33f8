//! JSON-RPC 2.0 request handling: single envelope, batch, notifications.

use futures::future::join_all;
use rt_rpc::{CallArgs, MethodRegistry, RpcError};
use serde_json::Value as Json;

use crate::discovery::build_openrpc_document;
use crate::envelope::{JsonRpcRequest, JsonRpcResponse};

/// `None` means "nothing to send" — an all-notifications batch.
pub async fn handle_body(registry: &MethodRegistry, body: &[u8]) -> Option<Json> {
    let parsed: Result<Json, _> = serde_json::from_slice(body);
    let Ok(value) = parsed else {
        return Some(error_envelope(Json::Null, &RpcError::ParseError("invalid JSON".to_string())));
    };

    match value {
        Json::Array(items) => handle_batch(registry, items).await,
        Json::Object(_) => handle_single(registry, value).await.map(|r| serde_json::to_value(r).unwrap()),
        _ => Some(error_envelope(
            Json::Null,
            &RpcError::InvalidRequest("a batch must be a non-empty array of request objects".to_string()),
        )),
    }
}

async fn handle_batch(registry: &MethodRegistry, items: Vec<Json>) -> Option<Json> {
    if items.is_empty() {
        return Some(error_envelope(
            Json::Null,
            &RpcError::InvalidRequest("a batch must be a non-empty array".to_string()),
        ));
    }
    if items.iter().any(|v| !v.is_object()) {
        return Some(error_envelope(
            Json::Null,
            &RpcError::InvalidRequest("every batch entry must be a request object".to_string()),
        ));
    }

    let responses = join_all(items.into_iter().map(|item| handle_single(registry, item))).await;
    let visible: Vec<JsonRpcResponse> = responses.into_iter().flatten().collect();
    if visible.is_empty() {
        None
    } else {
        Some(serde_json::to_value(visible).unwrap())
    }
}

/// Returns `None` for a notification (executed, but nothing is sent back).
async fn handle_single(registry: &MethodRegistry, envelope: Json) -> Option<JsonRpcResponse> {
    let request: JsonRpcRequest = match serde_json::from_value(envelope) {
        Ok(r) => r,
        Err(e) => return Some(JsonRpcResponse::err(Json::Null, &RpcError::InvalidRequest(e.to_string()))),
    };

    if request.method == "rpc.discover" {
        let doc = build_openrpc_document(registry);
        return request_result(request, serde_json::to_value(doc).unwrap());
    }

    let mut request = request;
    let args = match std::mem::take(&mut request.params) {
        Some(Json::Array(items)) => CallArgs::Positional(items),
        Some(Json::Object(map)) => CallArgs::Named(map),
        Some(_) => {
            return id_aware_error(
                request.id.clone(),
                request.is_notification(),
                RpcError::InvalidRequest("params must be an array or object".to_string()),
            )
        }
        None => CallArgs::None,
    };

    match registry.exec(&request.method, args).await {
        Ok(result) => request_result_with_notify(request, result),
        Err(err) => id_aware_error(request.id.clone(), request.is_notification(), err),
    }
}

fn request_result(request: JsonRpcRequest, result: Json) -> Option<JsonRpcResponse> {
    request_result_with_notify(request, result)
}

fn request_result_with_notify(request: JsonRpcRequest, result: Json) -> Option<JsonRpcResponse> {
    if request.is_notification() {
        None
    } else {
        Some(JsonRpcResponse::ok(request.id.unwrap_or(Json::Null), result))
    }
}

fn id_aware_error(id: Option<Json>, is_notification: bool, err: RpcError) -> Option<JsonRpcResponse> {
    if is_notification {
        None
    } else {
        Some(JsonRpcResponse::err(id.unwrap_or(Json::Null), &err))
    }
}

fn error_envelope(id: Json, err: &RpcError) -> Json {
    serde_json::to_value(JsonRpcResponse::err(id, err)).unwrap()
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
    async fn single_request_returns_single_envelope() {
        let body = br#"{"jsonrpc":"2.0","method":"echo","params":{"value":"hi"},"id":1}"#;
        let response = handle_body(&registry(), body).await.unwrap();
        assert_eq!(response["result"], serde_json::json!("hi"));
    }

    #[tokio::test]
    async fn notification_produces_no_response() {
        let body = br#"{"jsonrpc":"2.0","method":"echo","params":{"value":"hi"}}"#;
        assert!(handle_body(&registry(), body).await.is_none());
    }

    #[tokio::test]
    async fn mixed_batch_preserves_order_and_drops_notifications() {
        let body = br#"[
            {"jsonrpc":"2.0","method":"echo","params":{"value":"a"},"id":1},
            {"jsonrpc":"2.0","method":"echo","params":{"value":"b"}},
            {"jsonrpc":"2.0","method":"missing","id":2}
        ]"#;
        let response = handle_body(&registry(), body).await.unwrap();
        let array = response.as_array().unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array[0]["result"], serde_json::json!("a"));
        assert_eq!(array[1]["error"]["code"], serde_json::json!(-32601));
    }

    #[tokio::test]
    async fn all_notification_batch_produces_no_body() {
        let body = br#"[{"jsonrpc":"2.0","method":"echo","params":{"value":"a"}}]"#;
        assert!(handle_body(&registry(), body).await.is_none());
    }

    #[tokio::test]
    async fn malformed_batch_yields_single_null_id_error() {
        let body = br#"[]"#;
        let response = handle_body(&registry(), body).await.unwrap();
        assert_eq!(response["id"], Json::Null);
        assert_eq!(response["error"]["code"], serde_json::json!(-32600));
    }
}
