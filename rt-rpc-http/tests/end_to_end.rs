//! Full-network-stack coverage for the two external surfaces this crate
//! exposes: a JSON-RPC mixed batch, and a positional RPC call round
//! tripping base64-encoded bytes.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use rt_core::Application;
use rt_rpc::{MethodRegistry, ParamSpec, RpcMethod, RpcValue};
use rt_rpc_http::RpcHttpServer;

fn build_registry() -> MethodRegistry {
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
    registry.register(
        RpcMethod::new(
            "fail",
            Arc::new(|_args: BTreeMap<String, RpcValue>| async move {
                Err(rt_rpc::RpcError::InternalError("boom".to_string()))
            }),
        ),
    );
    registry.register(
        RpcMethod::new(
            "echo_bytes",
            Arc::new(|args: BTreeMap<String, RpcValue>| async move {
                Ok(args.get("payload").cloned().unwrap_or(RpcValue::Bytes(Vec::new())))
            }),
        )
        .with_params(vec![ParamSpec::required("payload").bytes()]),
    );
    registry
}

async fn spawn_server() -> SocketAddr {
    let app = Arc::new(Application::new());
    let server = Arc::new(RpcHttpServer {
        app,
        registry: Arc::new(build_registry()),
        json_rpc_base: "/rpc".to_string(),
        positional_base: "/api".to_string(),
        cors: None,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    tokio::spawn(async move {
        let _ = server.serve(addr).await;
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    addr
}

#[tokio::test]
async fn json_rpc_mixed_batch_round_trips_over_http() {
    let addr = spawn_server().await;
    let client = reqwest::Client::new();

    let batch = serde_json::json!([
        {"jsonrpc": "2.0", "method": "echo", "params": {"value": "a"}, "id": 1},
        {"jsonrpc": "2.0", "method": "echo", "params": {"value": "b"}},
        {"jsonrpc": "2.0", "method": "fail", "id": 2},
    ]);

    let response = client.post(format!("http://{addr}/rpc")).json(&batch).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    let array = body.as_array().unwrap();
    assert_eq!(array.len(), 2);
    assert_eq!(array[0]["result"], serde_json::json!("a"));
    assert_eq!(array[1]["error"]["code"], serde_json::json!(-32603));
}

#[tokio::test]
async fn positional_rpc_round_trips_base64_bytes() {
    let addr = spawn_server().await;
    let client = reqwest::Client::new();

    let payload = "data:application/octet-stream;base64,aGVsbG8=";
    let response = client
        .post(format!("http://{addr}/api/echo_bytes"))
        .json(&serde_json::json!({"payload": payload}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!(payload));
}

#[tokio::test]
async fn health_endpoint_reports_healthy_with_no_components() {
    let addr = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client.get(format!("http://{addr}/health")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["is_sick"], serde_json::json!(false));
}

#[tokio::test]
async fn swagger_surface_serves_html_pointed_at_the_openapi_document() {
    let addr = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client.get(format!("http://{addr}/swagger")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers()["content-type"].to_str().unwrap().starts_with("text/html"));
    let body = response.text().await.unwrap();
    assert!(body.contains("/openapi.json"));
}

#[tokio::test]
async fn redoc_surface_serves_html_pointed_at_the_openapi_document() {
    let addr = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client.get(format!("http://{addr}/redoc")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers()["content-type"].to_str().unwrap().starts_with("text/html"));
    let body = response.text().await.unwrap();
    assert!(body.contains("/openapi.json"));
}
