//! Prometheus metrics adapter.
//!
//! Grounded on `opentelemetry-prometheus`'s registry/exposition pattern: a
//! single [`prometheus::Registry`] owns the collectors, and `handle` simply
//! updates them; exposition (`/metrics`) is a separate concern left to
//! `rt-rpc-http`, which calls [`PrometheusAdapter::gather`].

use async_trait::async_trait;
use prometheus::{HistogramVec, IntCounterVec, Opts, Registry};
use rt_trace::{FinishedSpan, SpanKind};

use crate::adapter::SpanAdapter;
use crate::error::AdapterError;

const ADAPTER_ID: &str = "prometheus";

/// Counts requests and records their duration, labeled by RPC method and
/// error class, the way `original_source/ipapp`'s prometheus logger adapter does.
#[derive(Debug)]
pub struct PrometheusAdapter {
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration_seconds: HistogramVec,
}

impl PrometheusAdapter {
    pub fn new() -> Result<Self, AdapterError> {
        let registry = Registry::new();
        let requests_total = IntCounterVec::new(
            Opts::new("rpc_requests_total", "Total RPC requests handled"),
            &["method", "error_class"],
        )
        .map_err(|e| AdapterError::Start { adapter: ADAPTER_ID, source: e.into() })?;
        let request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new("rpc_request_duration_seconds", "RPC request duration in seconds"),
            &["method", "error_class"],
        )
        .map_err(|e| AdapterError::Start { adapter: ADAPTER_ID, source: e.into() })?;

        registry
            .register(Box::new(requests_total.clone()))
            .map_err(|e| AdapterError::Start { adapter: ADAPTER_ID, source: e.into() })?;
        registry
            .register(Box::new(request_duration_seconds.clone()))
            .map_err(|e| AdapterError::Start { adapter: ADAPTER_ID, source: e.into() })?;

        Ok(PrometheusAdapter { registry, requests_total, request_duration_seconds })
    }

    /// Renders the current metric snapshot in the Prometheus text exposition format.
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf).ok();
        String::from_utf8(buf).unwrap_or_default()
    }
}

#[async_trait]
impl SpanAdapter for PrometheusAdapter {
    fn id(&self) -> &'static str {
        ADAPTER_ID
    }

    async fn handle(&self, span: &FinishedSpan) {
        if span.kind != SpanKind::Server {
            return;
        }
        let method = span.name_for(ADAPTER_ID).to_string();
        let error_class = span.error_class.clone().unwrap_or_default();
        self.requests_total.with_label_values(&[&method, &error_class]).inc();
        self.request_duration_seconds
            .with_label_values(&[&method, &error_class])
            .observe(span.duration().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::SystemTime;

    fn finished(name: &str, kind: SpanKind) -> FinishedSpan {
        FinishedSpan {
            trace_id: rt_trace::TraceId::random(),
            span_id: rt_trace::SpanId::random(),
            parent_id: None,
            kind,
            name: name.to_string(),
            start: SystemTime::now(),
            finish: SystemTime::now(),
            tags: Default::default(),
            annotations: Default::default(),
            adapter_overrides: Default::default(),
            error_class: None,
        }
    }

    #[tokio::test]
    async fn counts_only_server_spans() {
        let adapter = PrometheusAdapter::new().unwrap();
        adapter.handle(&finished("rpc.echo", SpanKind::Server)).await;
        adapter.handle(&finished("db.query", SpanKind::Client)).await;
        let exposition = adapter.gather();
        assert!(exposition.contains("rpc_requests_total"));
        assert!(exposition.contains("rpc.echo"));
        assert!(!exposition.contains("db.query"));
    }

    #[test]
    fn registry_is_shareable() {
        let adapter = Arc::new(PrometheusAdapter::new().unwrap());
        let _: Arc<PrometheusAdapter> = adapter;
    }
}
