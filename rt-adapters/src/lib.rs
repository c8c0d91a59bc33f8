//! The adapter bus: fans finished spans out to observability sinks.
//!
//! `rt-trace` only knows how to produce a [`rt_trace::FinishedSpan`] and hand
//! it to a [`rt_trace::SpanEmitter`]; this crate is the one real emitter,
//! [`Logger`], plus the four concrete [`SpanAdapter`] sinks it can drive.

mod adapter;
mod adapters;
mod error;
mod logger;
mod mask;

pub use adapter::SpanAdapter;
pub use adapters::{PrometheusAdapter, RequestsAdapter, SentryAdapter, ZipkinAdapter};
pub use error::AdapterError;
pub use logger::Logger;
pub use mask::mask_url_value;
