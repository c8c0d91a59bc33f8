//! AMQP RPC server: consumes a named queue, executes the requested method
//! through the shared registry, replies on `reply_to` with `correlation_id`
//! preserved.

use std::sync::Arc;

use futures::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel};
use rt_rpc::{CallArgs, MethodRegistry};
use serde_json::Value as Json;

use crate::propagation::headers_to_map;

#[derive(Debug, Clone)]
pub struct QueueOptions {
    pub durable: bool,
    pub auto_delete: bool,
    pub prefetch: u16,
}

impl Default for QueueOptions {
    fn default() -> Self {
        QueueOptions { durable: true, auto_delete: false, prefetch: 16 }
    }
}

pub struct AmqpRpcServer {
    channel: Channel,
    queue_name: String,
    registry: Arc<MethodRegistry>,
    emitter: Arc<dyn rt_trace::SpanEmitter>,
    options: QueueOptions,
}

impl AmqpRpcServer {
    pub async fn new(
        channel: Channel,
        queue_name: impl Into<String>,
        registry: Arc<MethodRegistry>,
        emitter: Arc<dyn rt_trace::SpanEmitter>,
        options: QueueOptions,
    ) -> Result<Self, lapin::Error> {
        let queue_name = queue_name.into();
        channel
            .queue_declare(
                &queue_name,
                QueueDeclareOptions { durable: options.durable, auto_delete: options.auto_delete, ..Default::default() },
                FieldTable::default(),
            )
            .await?;
        channel.basic_qos(options.prefetch, Default::default()).await?;
        Ok(AmqpRpcServer { channel, queue_name, registry, emitter, options })
    }

    /// Consumes the queue until the stream closes (e.g. channel shutdown).
    pub async fn run(&self) -> Result<(), lapin::Error> {
        let mut consumer = self
            .channel
            .basic_consume(&self.queue_name, "rt-rpc-amqp", BasicConsumeOptions::default(), FieldTable::default())
            .await?;

        while let Some(delivery) = consumer.next().await {
            let Ok(delivery) = delivery else { continue };
            let reply_to = delivery.properties.reply_to().clone();
            let correlation_id = delivery.properties.correlation_id().clone();
            let headers = delivery.properties.headers().clone().unwrap_or_default();

            let span = rt_trace::Span::from_headers(&headers_to_map(&headers), self.emitter.clone());
            let _scope = span.clone().enter();

            let response = self.handle_payload(&delivery.data).await;

            if let Some(reply_to) = reply_to {
                let props = BasicProperties::default().with_correlation_id(
                    correlation_id.unwrap_or_else(|| "".into()),
                );
                let body = serde_json::to_vec(&response).unwrap_or_default();
                let _ = self
                    .channel
                    .basic_publish(
                        "",
                        reply_to.as_str(),
                        BasicPublishOptions::default(),
                        &body,
                        props,
                    )
                    .await;
            }

            let _ = self.channel.basic_ack(delivery.delivery_tag, BasicAckOptions::default()).await;
        }
        Ok(())
    }

    async fn handle_payload(&self, data: &[u8]) -> Json {
        let request: Result<AmqpRequest, _> = serde_json::from_slice(data);
        let request = match request {
            Ok(r) => r,
            Err(e) => return error_json(&rt_rpc::RpcError::ParseError(e.to_string())),
        };

        let args = match request.params {
            Some(Json::Array(items)) => CallArgs::Positional(items),
            Some(Json::Object(map)) => CallArgs::Named(map),
            Some(_) => return error_json(&rt_rpc::RpcError::InvalidRequest("params must be array or object".to_string())),
            None => CallArgs::None,
        };

        match self.registry.exec(&request.method, args).await {
            Ok(result) => serde_json::json!({"result": result}),
            Err(err) => error_json(&err),
        }
    }
}

#[derive(serde::Deserialize)]
struct AmqpRequest {
    method: String,
    #[serde(default)]
    params: Option<Json>,
}

fn error_json(err: &rt_rpc::RpcError) -> Json {
    serde_json::json!({"error": {"code": err.code(), "message": err.to_string(), "data": err.data()}})
}
