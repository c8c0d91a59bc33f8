//! Ambient, task-local state: `app`, `span`, `request`, `span_traps`.
//!
//! `set` returns a token whose `Drop` performs the matching `reset`, so nested
//! `set`/`reset` pairs form a stack that unwinds itself even across an early
//! return or a panic. Out-of-order drop (dropping an outer guard while an
//! inner one is still live) is a programming error, flagged with a debug
//! assertion rather than corrupting the stack silently.

use std::cell::RefCell;
use std::sync::Arc;

use rt_adapters::Logger;
use rt_trace::{Span, SpanTrap};

use crate::application::Application;

tokio::task_local! {
    static APP: RefCell<Vec<Arc<Application>>>;
    static SPAN: RefCell<Vec<Span>>;
    static REQUEST: RefCell<Vec<Arc<dyn std::any::Any + Send + Sync>>>;
    static SPAN_TRAPS: RefCell<Vec<Arc<SpanTrap>>>;
}

macro_rules! slot_accessors {
    ($slot:ident, $ty:ty, $get:ident, $set:ident, $guard:ident) => {
        /// Returns the innermost bound value for this slot, if any.
        pub fn $get() -> Option<$ty> {
            $slot.try_with(|stack| stack.borrow().last().cloned()).ok().flatten()
        }

        /// Binds `value` for the remainder of the current task-local scope.
        /// Dropping the returned guard restores the previous value.
        #[must_use = "dropping the guard immediately un-sets the value"]
        pub fn $set(value: $ty) -> $guard {
            $slot.with(|stack| stack.borrow_mut().push(value));
            let depth = $slot.with(|stack| stack.borrow().len());
            $guard { depth }
        }
    };
}

pub struct AppGuard {
    depth: usize,
}

impl Drop for AppGuard {
    fn drop(&mut self) {
        pop_checked(&APP, self.depth);
    }
}

pub struct SpanGuard {
    depth: usize,
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        pop_checked(&SPAN, self.depth);
    }
}

pub struct RequestGuard {
    depth: usize,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        pop_checked(&REQUEST, self.depth);
    }
}

pub struct SpanTrapGuard {
    depth: usize,
}

impl Drop for SpanTrapGuard {
    fn drop(&mut self) {
        pop_checked(&SPAN_TRAPS, self.depth);
    }
}

fn pop_checked<T>(slot: &'static tokio::task::LocalKey<RefCell<Vec<T>>>, expected_depth: usize) {
    let _ = slot.try_with(|stack| {
        let mut stack = stack.borrow_mut();
        debug_assert_eq!(
            stack.len(),
            expected_depth,
            "ambient context slot reset out of order: nested set/reset pairs must unwind LIFO"
        );
        stack.pop();
    });
}

slot_accessors!(APP, Arc<Application>, current_app, set_app, AppGuard);
slot_accessors!(SPAN, Span, current_span, set_span, SpanGuard);
slot_accessors!(SPAN_TRAPS, Arc<SpanTrap>, current_span_trap, set_span_trap, SpanTrapGuard);

/// All traps currently in scope, innermost (most recently set) first — the
/// order in which they should get a chance to observe a newly created span.
pub fn active_span_traps() -> Vec<Arc<SpanTrap>> {
    SPAN_TRAPS
        .try_with(|stack| stack.borrow().iter().rev().cloned().collect())
        .unwrap_or_default()
}

/// The `request` slot is typed per-caller (HTTP request, AMQP delivery, task
/// row); callers downcast with `Any`. One request value is bound per logical
/// task and never mutated concurrently, matching the "owned exclusively by
/// its borrower" policy even though the handle itself is `Arc`-shared.
pub fn current_request<T: Send + Sync + 'static>() -> Option<Arc<T>> {
    REQUEST
        .try_with(|stack| stack.borrow().last().and_then(|r| Arc::downcast::<T>(r.clone()).ok()))
        .ok()
        .flatten()
}

#[must_use = "dropping the guard immediately un-sets the value"]
pub fn set_request<T: Send + Sync + 'static>(value: Arc<T>) -> RequestGuard {
    let boxed: Arc<dyn std::any::Any + Send + Sync> = value;
    REQUEST.with(|stack| stack.borrow_mut().push(boxed));
    let depth = REQUEST.with(|stack| stack.borrow().len());
    RequestGuard { depth }
}

/// Runs `fut` with fresh, empty ambient-context slots. Used at the root of
/// every logical task (an inbound request, a scheduled task execution) so
/// that state never leaks between independently scheduled units of work.
pub async fn scope<F: std::future::Future>(fut: F) -> F::Output {
    APP.scope(
        RefCell::new(Vec::new()),
        SPAN.scope(
            RefCell::new(Vec::new()),
            REQUEST.scope(RefCell::new(Vec::new()), SPAN_TRAPS.scope(RefCell::new(Vec::new()), fut)),
        ),
    )
    .await
}

/// The logger of the currently bound app, or a fresh no-op-backed logger's
/// root span if no app is bound (e.g. unit tests instantiating a bare span).
pub fn current_logger() -> Option<Arc<Logger>> {
    current_app().map(|app| app.logger())
}

/// Convenience used throughout `rt-rpc`/`rt-scheduler`: start a new span as a
/// child of the currently bound span, or as a fresh root if none is bound,
/// then offers every active trap a chance to observe it.
pub fn start_span(name: impl Into<String>, kind: rt_trace::SpanKind) -> Span {
    let span = match (current_span(), current_logger()) {
        (Some(parent), _) => parent.new_child(name, kind),
        (None, Some(logger)) => logger.new_root_span(name, kind),
        (None, None) => Span::noop(),
    };
    for trap in active_span_traps() {
        trap.observe(&span);
    }
    span
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::Application;

    #[tokio::test]
    async fn app_guard_restores_previous_binding() {
        scope(async {
            assert!(current_app().is_none());
            let app = Arc::new(Application::new());
            {
                let _guard = set_app(app.clone());
                assert!(current_app().is_some());
            }
            assert!(current_app().is_none());
        })
        .await;
    }

    #[tokio::test]
    async fn nested_scopes_do_not_leak_into_each_other() {
        let app = Arc::new(Application::new());
        scope(async {
            let _outer = set_app(app.clone());
            scope(async {
                assert!(current_app().is_none(), "a fresh scope starts with empty slots");
            })
            .await;
            assert!(current_app().is_some(), "the outer scope's binding survives the inner scope");
        })
        .await;
    }
}
