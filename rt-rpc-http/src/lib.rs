//! The HTTP transport for the RPC engine: JSON-RPC 2.0, positional
//! REST-style RPC, OpenAPI/OpenRPC discovery, and the health endpoint.

mod cors;
mod discovery;
mod envelope;
mod health;
mod json_rpc;
mod positional;
mod propagation;
mod server;

pub use cors::Cors;
pub use discovery::{build_openapi_document, build_openrpc_document, redoc_html, swagger_ui_html};
pub use envelope::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use health::{build_health_report, HealthReport};
pub use propagation::{HeaderMapExtractor, HeaderMapInjector};
pub use server::RpcHttpServer;
