//! Sentry error-reporting adapter.
//!
//! Grounded on `original_source/ipapp/logger/adapters/sentry.py`: only spans
//! carrying an error are posted, as a Sentry "event" with the error class as
//! fingerprint and the span's annotations folded into breadcrumbs. No `sentry`
//! crate exists anywhere in the retrieval pack, so events are posted directly
//! to the Sentry store endpoint with `reqwest`, matching how this pack's other
//! adapters speak their wire protocols directly (see `zipkin.rs`).

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rt_trace::FinishedSpan;
use serde::Serialize;

use crate::adapter::SpanAdapter;
use crate::error::AdapterError;

const ADAPTER_ID: &str = "sentry";

#[derive(Debug, Serialize)]
struct Breadcrumb {
    timestamp: f64,
    message: String,
    category: String,
}

#[derive(Debug, Serialize)]
struct SentryEvent<'a> {
    message: String,
    level: &'static str,
    fingerprint: Vec<String>,
    server_name: &'a str,
    tags: HashMap<String, String>,
    breadcrumbs: Vec<Breadcrumb>,
    extra: HashMap<String, String>,
}

fn secs_since_epoch(t: SystemTime) -> f64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

/// Posts finished spans carrying an error to a Sentry-compatible store endpoint.
#[derive(Debug)]
pub struct SentryAdapter {
    server_name: String,
    store_endpoint: String,
    auth_header: String,
    client: reqwest::Client,
}

impl SentryAdapter {
    /// `dsn_public_key` is embedded in the `X-Sentry-Auth` header the way the
    /// Sentry store API expects.
    pub fn new(server_name: impl Into<String>, store_endpoint: impl Into<String>, dsn_public_key: impl Into<String>) -> Self {
        let dsn_public_key = dsn_public_key.into();
        SentryAdapter {
            server_name: server_name.into(),
            store_endpoint: store_endpoint.into(),
            auth_header: format!(
                "Sentry sentry_version=7, sentry_client=rt-adapters/0.1, sentry_key={dsn_public_key}"
            ),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SpanAdapter for SentryAdapter {
    fn id(&self) -> &'static str {
        ADAPTER_ID
    }

    async fn start(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn handle(&self, span: &FinishedSpan) {
        let Some(error_class) = span.error_class.clone() else {
            return;
        };

        let tags = span.tags_for(ADAPTER_ID);
        let message = tags.get("error.message").cloned().unwrap_or_else(|| error_class.clone());
        let breadcrumbs = span
            .annotations_for(ADAPTER_ID)
            .into_iter()
            .flat_map(|(category, entries)| {
                entries.into_iter().map(move |a| Breadcrumb {
                    timestamp: secs_since_epoch(a.timestamp),
                    message: a.value,
                    category: category.clone(),
                })
            })
            .collect();

        let event = SentryEvent {
            message,
            level: "error",
            fingerprint: vec![error_class],
            server_name: &self.server_name,
            tags,
            breadcrumbs,
            extra: HashMap::from([
                ("trace_id".to_string(), span.trace_id.to_string()),
                ("span_id".to_string(), span.span_id.to_string()),
                ("span_name".to_string(), span.name_for(ADAPTER_ID).to_string()),
            ]),
        };

        let result = self
            .client
            .post(&self.store_endpoint)
            .header("X-Sentry-Auth", &self.auth_header)
            .json(&event)
            .send()
            .await;
        if let Err(err) = result {
            tracing::warn!(adapter = ADAPTER_ID, error = %err, "failed to report error event");
        }
    }
}
