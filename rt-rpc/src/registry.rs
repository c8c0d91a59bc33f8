//! The method registry and `exec` dispatch.

use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value as Json;

use crate::binder::{self, CallArgs};
use crate::error::RpcError;
use crate::param::ParamSpec;
use crate::value::RpcValue;

/// A user-declared error a method may raise, published via `rpc.discover`.
#[derive(Debug, Clone)]
pub struct ErrorSpec {
    pub code: i64,
    pub message: String,
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, args: BTreeMap<String, RpcValue>) -> Result<RpcValue, RpcError>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(BTreeMap<String, RpcValue>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<RpcValue, RpcError>> + Send,
{
    async fn call(&self, args: BTreeMap<String, RpcValue>) -> Result<RpcValue, RpcError> {
        (self)(args).await
    }
}

/// A registered method: its declarative metadata plus the handler `exec` invokes.
pub struct RpcMethod {
    pub name: String,
    pub summary: String,
    pub description: String,
    pub deprecated: bool,
    pub examples: Vec<Json>,
    pub errors: Vec<ErrorSpec>,
    pub params: Vec<ParamSpec>,
    pub result_schema: Option<Json>,
    pub tags: Vec<String>,
    handler: Arc<dyn Handler>,
}

impl std::fmt::Debug for RpcMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcMethod").field("name", &self.name).field("params", &self.params.len()).finish()
    }
}

impl RpcMethod {
    pub fn new(name: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        RpcMethod {
            name: name.into(),
            summary: String::new(),
            description: String::new(),
            deprecated: false,
            examples: Vec::new(),
            errors: Vec::new(),
            params: Vec::new(),
            result_schema: None,
            tags: Vec::new(),
            handler,
        }
    }

    /// Splits a docstring into its first line (summary) and the remainder
    /// (description), used as the fallback when neither is given explicitly.
    pub fn with_docstring(mut self, docstring: &str) -> Self {
        let mut lines = docstring.trim().splitn(2, '\n');
        self.summary = lines.next().unwrap_or_default().trim().to_string();
        self.description = lines.next().unwrap_or_default().trim().to_string();
        self
    }

    pub fn with_params(mut self, params: Vec<ParamSpec>) -> Self {
        self.params = params;
        self
    }

    pub fn with_errors(mut self, errors: Vec<ErrorSpec>) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }
}

/// Holds `name → RpcMethod` and performs the full §4.5 `exec` pipeline.
#[derive(Default)]
pub struct MethodRegistry {
    methods: HashMap<String, Arc<RpcMethod>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        MethodRegistry::default()
    }

    pub fn register(&mut self, method: RpcMethod) {
        self.methods.insert(method.name.clone(), Arc::new(method));
    }

    pub fn get(&self, name: &str) -> Option<Arc<RpcMethod>> {
        self.methods.get(name).cloned()
    }

    pub fn methods(&self) -> impl Iterator<Item = &Arc<RpcMethod>> {
        self.methods.values()
    }

    /// Looks up `name`, binds `args`, invokes the handler, and maps the
    /// outcome through the canonical serialization rule set. A panicking
    /// handler — Rust's analog of an uncaught exception — is caught and
    /// reported as a `ServerError` rather than unwinding into the caller.
    pub async fn exec(&self, name: &str, args: CallArgs) -> Result<Json, RpcError> {
        let method = self.get(name).ok_or_else(|| RpcError::MethodNotFound(name.to_string()))?;
        let bound = binder::bind(&method.params, args)?;

        let span = rt_core::context::start_span(format!("rpc.{name}"), rt_trace::SpanKind::Server);
        let _scope = span.clone().enter();

        let outcome = AssertUnwindSafe(method.handler.call(bound)).catch_unwind().await;
        let result = match outcome {
            Ok(Ok(value)) => Ok(value.to_canonical_json()),
            Ok(Err(err)) => Err(err),
            Err(panic) => {
                let message = panic_message(&panic);
                Err(RpcError::from_handler_panic(message))
            }
        };

        if let Err(err) = &result {
            let traceback = std::backtrace::Backtrace::force_capture().to_string();
            span.error(err_class(err), err.to_string(), Some(traceback));
        }
        result
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

fn err_class(err: &RpcError) -> &'static str {
    match err {
        RpcError::ParseError(_) => "ParseError",
        RpcError::InvalidRequest(_) => "InvalidRequest",
        RpcError::MethodNotFound(_) => "MethodNotFound",
        RpcError::InvalidArguments(_) => "InvalidArguments",
        RpcError::InternalError(_) => "InternalError",
        RpcError::ServerError(_) => "ServerError",
        RpcError::UserDefined { .. } => "UserDefined",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_method() -> RpcMethod {
        RpcMethod::new(
            "echo",
            Arc::new(|args: BTreeMap<String, RpcValue>| async move {
                Ok(args.get("value").cloned().unwrap_or(RpcValue::Null))
            }),
        )
        .with_params(vec![ParamSpec::required("value")])
    }

    #[tokio::test]
    async fn exec_binds_and_invokes_the_registered_handler() {
        let mut registry = MethodRegistry::new();
        registry.register(echo_method());
        let result = registry.exec("echo", CallArgs::Positional(vec![json!("hi")])).await.unwrap();
        assert_eq!(result, json!("hi"));
    }

    #[tokio::test]
    async fn exec_reports_method_not_found() {
        let registry = MethodRegistry::new();
        let err = registry.exec("missing", CallArgs::None).await.unwrap_err();
        assert!(matches!(err, RpcError::MethodNotFound(_)));
    }

    #[tokio::test]
    async fn exec_turns_a_handler_panic_into_a_server_error() {
        let mut registry = MethodRegistry::new();
        registry.register(RpcMethod::new(
            "boom",
            Arc::new(|_: BTreeMap<String, RpcValue>| async move {
                panic!("kaboom");
                #[allow(unreachable_code)]
                Ok(RpcValue::Null)
            }),
        ));
        let err = registry.exec("boom", CallArgs::None).await.unwrap_err();
        eprintln!("DEBUG ERR = {:?}", err);
        assert!(matches!(err, RpcError::ServerError(msg) if msg.contains("kaboom")));
    }

    #[test]
    fn docstring_splits_summary_and_description() {
        let method = RpcMethod::new("m", Arc::new(|_: BTreeMap<String, RpcValue>| async move { Ok(RpcValue::Null) }))
            .with_docstring("Summary line.\n\nRest of the description.");
        assert_eq!(method.summary, "Summary line.");
        assert_eq!(method.description, "Rest of the description.");
    }
}
