use std::sync::Mutex;

use crate::span::Span;

/// A scoped observer that captures the first span matching its predicate.
///
/// Traps are pushed onto a LIFO stack by the ambient context (`rt-core`) so
/// that instrumentation code can retroactively inspect or retag a span it
/// did not itself create — for example, a middleware that wants to rename
/// the span an inner RPC dispatch created without threading a name through
/// every call site.
pub struct SpanTrap {
    predicate: Box<dyn Fn(&Span) -> bool + Send + Sync>,
    captured: Mutex<Option<Span>>,
}

impl SpanTrap {
    pub fn new(predicate: impl Fn(&Span) -> bool + Send + Sync + 'static) -> Self {
        SpanTrap { predicate: Box::new(predicate), captured: Mutex::new(None) }
    }

    /// Matches every span; the common case of "capture whatever comes next".
    pub fn any() -> Self {
        SpanTrap::new(|_| true)
    }

    /// Offers a newly created span to the trap. No-op once a span has been captured.
    pub fn observe(&self, span: &Span) {
        let mut slot = self.captured.lock().unwrap();
        if slot.is_none() && (self.predicate)(span) {
            *slot = Some(span.clone());
        }
    }

    pub fn captured(&self) -> Option<Span> {
        self.captured.lock().unwrap().clone()
    }
}
