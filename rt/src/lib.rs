//! Wires the runtime's component crates into one [`rt_core::Application`]
//! and provides a `bootstrap` entry point for a binary-style `main`.

mod bootstrap;
mod builder;

pub use bootstrap::{bootstrap, init_tracing};
pub use builder::RuntimeBuilder;

pub use rt_adapters::{Logger, PrometheusAdapter, RequestsAdapter, SentryAdapter, SpanAdapter, ZipkinAdapter};
pub use rt_core::{Application, Component, ConfigSource, EnvSource};
pub use rt_db::DbPool;
pub use rt_lock::{InProcessBackend, LockBackend, LockRegistry, RedisBackend, RelationalBackend};
pub use rt_rpc::{CallArgs, ErrorSpec, Handler, MethodRegistry, ParamSpec, RpcError, RpcMethod, RpcValue};
pub use rt_rpc_amqp::{AmqpRpcClient, AmqpRpcServer, QueueOptions};
pub use rt_rpc_http::{Cors, RpcHttpServer};
pub use rt_scheduler::{CrontabEntry, DoNotMiss, NewTask, SchedulerError, TaskManager};
pub use rt_trace::{Span, SpanKind};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_no_adapters() {
        let app = RuntimeBuilder::new().build();
        assert!(app.get("nonexistent").is_none());
    }
}
