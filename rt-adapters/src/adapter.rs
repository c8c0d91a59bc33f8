use std::fmt;

use async_trait::async_trait;
use rt_trace::FinishedSpan;

use crate::error::AdapterError;

/// A sink that consumes finished spans and produces external observability data.
///
/// Narrowed to a single `handle` hook plus the lifecycle hooks the adapter
/// bus drives in parallel (`on_start`/`shutdown`/`force_flush`-style).
#[async_trait]
pub trait SpanAdapter: fmt::Debug + Send + Sync {
    /// The well-known identity this adapter's per-span overrides are keyed by.
    fn id(&self) -> &'static str;

    async fn start(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn stop(&self) {}

    async fn handle(&self, span: &FinishedSpan);
}
