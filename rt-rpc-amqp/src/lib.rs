//! The AMQP transport for the RPC engine: a consuming server and a
//! correlation-id-matching client, both propagating B3 trace headers
//! through the AMQP `headers` property.

mod client;
mod propagation;
mod server;

pub use client::{AmqpRpcClient, AmqpRpcClientError};
pub use propagation::{headers_to_map, FieldTableInjector};
pub use server::{AmqpRpcServer, QueueOptions};
