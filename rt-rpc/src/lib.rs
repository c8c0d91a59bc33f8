//! The RPC engine: a transport-agnostic method registry, argument binder,
//! canonical serialization rule set, and error taxonomy. `rt-rpc-http` and
//! `rt-rpc-amqp` both dispatch through [`MethodRegistry::exec`].

mod binder;
mod error;
mod param;
mod registry;
mod schema;
mod value;

pub use binder::CallArgs;
pub use error::RpcError;
pub use param::ParamSpec;
pub use registry::{ErrorSpec, Handler, MethodRegistry, RpcMethod};
pub use value::{RpcValue, BASE64_MARKER};
