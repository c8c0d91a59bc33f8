//! The HTTP transport binding: routes JSON-RPC, positional RPC, discovery,
//! and health requests onto a hyper server.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use rt_core::Application;
use rt_rpc::MethodRegistry;
use tokio::net::TcpListener;

use crate::cors::Cors;
use crate::discovery::{build_openapi_document, build_openrpc_document, redoc_html, swagger_ui_html};
use crate::health::build_health_report;
use crate::propagation::{HeaderMapExtractor, HeaderMapInjector};
use crate::{json_rpc, positional};

pub struct RpcHttpServer {
    pub app: Arc<Application>,
    pub registry: Arc<MethodRegistry>,
    pub json_rpc_base: String,
    pub positional_base: String,
    pub cors: Option<Cors>,
}

type BoxBody = Full<Bytes>;

impl RpcHttpServer {
    pub async fn serve(self: Arc<Self>, addr: SocketAddr) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { server.route(req).await }
                });
                if let Err(err) = ConnBuilder::new(TokioExecutor::new()).serve_connection(io, service).await {
                    tracing::warn!(error = %err, "connection error");
                }
            });
        }
    }

    async fn route(&self, req: Request<Incoming>) -> Result<Response<BoxBody>, Infallible> {
        let (parts, body) = req.into_parts();
        let body_bytes = body.collect().await.map(|c| c.to_bytes()).unwrap_or_default();
        let path = parts.uri.path().to_string();

        let span = rt_trace::Span::from_headers(&HeaderMapExtractor(&parts.headers), self.app.logger().as_emitter());
        let _scope = span.clone().enter();

        let response = if path == self.json_rpc_base && parts.method == http::Method::POST {
            let body = json_rpc::handle_body(&self.registry, &body_bytes).await;
            match body {
                Some(json) => json_response(StatusCode::OK, &json),
                None => empty_response(StatusCode::OK),
            }
        } else if let Some(method) = path.strip_prefix(&format!("{}/", self.positional_base)) {
            let method = method.trim_end_matches('/');
            if parts.method == http::Method::OPTIONS {
                cors_preflight_response(self.cors.as_ref())
            } else if parts.method == http::Method::POST {
                let result = positional::handle(&self.registry, method, &body_bytes).await;
                json_response(
                    StatusCode::from_u16(result.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                    &result.body,
                )
            } else {
                empty_response(StatusCode::METHOD_NOT_ALLOWED)
            }
        } else if path == "/openapi.json" {
            json_response(StatusCode::OK, &build_openapi_document(&self.registry, &self.positional_base))
        } else if path == "/openapi.yaml" {
            let doc = build_openapi_document(&self.registry, &self.positional_base);
            text_response(StatusCode::OK, &serde_yaml_like(&doc))
        } else if path == "/swagger" {
            html_response(StatusCode::OK, &swagger_ui_html("/openapi.json"))
        } else if path == "/redoc" {
            html_response(StatusCode::OK, &redoc_html("/openapi.json"))
        } else if path == "/health" {
            let report = build_health_report(&self.app).await;
            let status = StatusCode::from_u16(report.status).unwrap_or(StatusCode::OK);
            if parts.method == http::Method::HEAD {
                empty_response(status)
            } else {
                json_response(status, &report.body)
            }
        } else if path == "/" && parts.method == http::Method::POST {
            // bare `rpc.discover` convenience: a JSON-RPC client may also
            // reach the document directly.
            json_response(StatusCode::OK, &build_openrpc_document(&self.registry))
        } else {
            empty_response(StatusCode::NOT_FOUND)
        };

        let mut response = response;
        let mut outbound_headers = http::HeaderMap::new();
        span.to_headers(&mut HeaderMapInjector(&mut outbound_headers));
        response.headers_mut().extend(outbound_headers);
        Ok(response)
    }
}

fn cors_preflight_response(cors: Option<&Cors>) -> Response<BoxBody> {
    let mut builder = Response::builder().status(StatusCode::NO_CONTENT);
    if let Some(cors) = cors {
        for (name, value) in cors.preflight_headers() {
            builder = builder.header(name, value);
        }
    }
    builder.body(Full::new(Bytes::new())).unwrap()
}

fn json_response(status: StatusCode, body: &serde_json::Value) -> Response<BoxBody> {
    let bytes = serde_json::to_vec(body).unwrap_or_default();
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(bytes)))
        .unwrap()
}

fn text_response(status: StatusCode, body: &str) -> Response<BoxBody> {
    Response::builder()
        .status(status)
        .header("content-type", "application/yaml")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

fn html_response(status: StatusCode, body: &str) -> Response<BoxBody> {
    Response::builder()
        .status(status)
        .header("content-type", "text/html; charset=utf-8")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

fn empty_response(status: StatusCode) -> Response<BoxBody> {
    Response::builder().status(status).body(Full::new(Bytes::new())).unwrap()
}

/// A minimal JSON-to-YAML-ish renderer so `/openapi.yaml` does not require
/// pulling in a YAML crate for a single discovery endpoint; adequate for the
/// flat, string/number-heavy documents this generates.
fn serde_yaml_like(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}
