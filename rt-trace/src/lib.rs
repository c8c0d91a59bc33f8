//! Causal span model shared by every transport the runtime speaks.
//!
//! This crate has no knowledge of HTTP, AMQP, databases, or the ambient
//! per-task context that makes "the current span" available to call sites —
//! those live in `rt-adapters` (dispatch) and `rt-core` (ambient slots). What
//! it owns is the span record itself: trace/span identifiers, the
//! tag/annotation bag, per-adapter overrides, B3 header codec, and the
//! finish/handle cascade that guarantees a span reaches the adapter bus at
//! most once, only after its root has finished.

mod b3;
mod ids;
mod propagation;
mod span;
mod trap;

pub use ids::{IdParseError, SpanId, TraceId};
pub use propagation::{Extractor, Injector};
pub use span::{AdapterOverride, Annotation, FinishedSpan, Span, SpanEmitter, SpanKind, SpanScope};
pub use trap::SpanTrap;
