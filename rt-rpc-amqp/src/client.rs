//! AMQP RPC client: a per-instance exclusive reply queue, outstanding calls
//! tracked by `correlation_id`, resolved on reply or rejected on timeout.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::StreamExt;
use lapin::options::{BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel};
use serde_json::Value as Json;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::propagation::FieldTableInjector;

#[derive(Debug, thiserror::Error)]
pub enum AmqpRpcClientError {
    #[error("call timed out waiting for a reply")]
    Timeout,
    #[error("amqp error: {0}")]
    Lapin(#[from] lapin::Error),
    #[error("reply channel closed without a response")]
    Closed,
}

pub struct AmqpRpcClient {
    channel: Channel,
    reply_queue: String,
    pending: Arc<DashMap<String, oneshot::Sender<Json>>>,
}

impl AmqpRpcClient {
    pub async fn connect(channel: Channel) -> Result<Self, lapin::Error> {
        let queue = channel
            .queue_declare(
                "",
                QueueDeclareOptions { exclusive: true, auto_delete: true, durable: false, ..Default::default() },
                FieldTable::default(),
            )
            .await?;
        let reply_queue = queue.name().to_string();

        let pending: Arc<DashMap<String, oneshot::Sender<Json>>> = Arc::new(DashMap::new());
        let mut consumer = channel
            .basic_consume(&reply_queue, "rt-rpc-amqp-client", BasicConsumeOptions::default(), FieldTable::default())
            .await?;

        let pending_for_task = pending.clone();
        tokio::spawn(async move {
            while let Some(delivery) = consumer.next().await {
                let Ok(delivery) = delivery else { continue };
                let Some(correlation_id) = delivery.properties.correlation_id().clone() else { continue };
                if let Some((_, sender)) = pending_for_task.remove(correlation_id.as_str()) {
                    let response: Json = serde_json::from_slice(&delivery.data).unwrap_or(Json::Null);
                    let _ = sender.send(response);
                }
            }
        });

        Ok(AmqpRpcClient { channel, reply_queue, pending })
    }

    pub async fn call(
        &self,
        queue: &str,
        method: &str,
        params: Json,
        timeout: Duration,
        span: Option<&rt_trace::Span>,
    ) -> Result<Json, AmqpRpcClientError> {
        let correlation_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(correlation_id.clone(), tx);

        let mut headers = FieldTable::default();
        if let Some(span) = span {
            span.to_headers(&mut FieldTableInjector(&mut headers));
        }

        let body = serde_json::json!({"method": method, "params": params});
        let props = BasicProperties::default()
            .with_reply_to(self.reply_queue.as_str().into())
            .with_correlation_id(correlation_id.as_str().into())
            .with_headers(headers);

        self.channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &serde_json::to_vec(&body).unwrap_or_default(),
                props,
            )
            .await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(AmqpRpcClientError::Closed),
            Err(_) => {
                self.pending.remove(&correlation_id);
                Err(AmqpRpcClientError::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_error_is_distinguishable_from_closed() {
        assert!(matches!(AmqpRpcClientError::Timeout, AmqpRpcClientError::Timeout));
        assert!(matches!(AmqpRpcClientError::Closed, AmqpRpcClientError::Closed));
    }
}
