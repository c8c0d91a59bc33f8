use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::ids::{SpanId, TraceId};
use crate::propagation::{Extractor, Injector};

/// Three positions a span can occupy relative to the boundary it instruments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpanKind {
    Client,
    Server,
    None,
}

/// A single annotated event, recorded under some `kind` (e.g. `"message"`, `"tag"`, `"traceback"`).
#[derive(Clone, Debug)]
pub struct Annotation {
    pub value: String,
    pub timestamp: SystemTime,
}

/// Canonical tags recorded by [`Span::error`].
pub struct SpanError {
    pub class: String,
    pub message: String,
}

/// Per-adapter overrides layered on top of the span's global tag/annotation view.
#[derive(Clone, Debug, Default)]
pub struct AdapterOverride {
    pub name: Option<String>,
    pub tags: HashMap<String, String>,
    pub annotations: HashMap<String, Vec<Annotation>>,
}

/// An immutable snapshot of a span handed to the adapter bus exactly once.
#[derive(Clone, Debug)]
pub struct FinishedSpan {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub parent_id: Option<SpanId>,
    pub kind: SpanKind,
    pub name: String,
    pub start: SystemTime,
    pub finish: SystemTime,
    pub tags: HashMap<String, String>,
    pub annotations: HashMap<String, Vec<Annotation>>,
    pub adapter_overrides: HashMap<String, AdapterOverride>,
    pub error_class: Option<String>,
}

impl FinishedSpan {
    /// The tag view an adapter should use: global tags overlaid by that adapter's overrides.
    pub fn tags_for(&self, adapter: &str) -> HashMap<String, String> {
        let mut merged = self.tags.clone();
        if let Some(over) = self.adapter_overrides.get(adapter) {
            merged.extend(over.tags.clone());
        }
        merged
    }

    /// The annotation view an adapter should use: global annotations overlaid by overrides.
    pub fn annotations_for(&self, adapter: &str) -> HashMap<String, Vec<Annotation>> {
        let mut merged = self.annotations.clone();
        if let Some(over) = self.adapter_overrides.get(adapter) {
            merged.extend(over.annotations.clone());
        }
        merged
    }

    pub fn name_for(&self, adapter: &str) -> &str {
        self.adapter_overrides
            .get(adapter)
            .and_then(|o| o.name.as_deref())
            .unwrap_or(&self.name)
    }

    pub fn duration(&self) -> std::time::Duration {
        self.finish.duration_since(self.start).unwrap_or_default()
    }
}

/// Sink that consumes a span exactly once, only after its emission is cascade-ready.
///
/// Implemented by the adapter bus (`rt-adapters`); this crate only defines the contract.
pub trait SpanEmitter: fmt::Debug + Send + Sync {
    fn emit(&self, span: FinishedSpan);
}

#[derive(Debug)]
struct NoopEmitter;

impl SpanEmitter for NoopEmitter {
    fn emit(&self, _span: FinishedSpan) {}
}

struct SpanState {
    kind: SpanKind,
    name: String,
    start: SystemTime,
    finish: Option<SystemTime>,
    tags: HashMap<String, String>,
    annotations: HashMap<String, Vec<Annotation>>,
    adapter_overrides: HashMap<String, AdapterOverride>,
    skip: bool,
    error_class: Option<String>,
    handled: bool,
}

struct Registry {
    nodes: HashMap<SpanId, Arc<SpanNode>>,
    emitter: Arc<dyn SpanEmitter>,
}

struct SpanNode {
    trace_id: TraceId,
    span_id: SpanId,
    parent_id: Option<SpanId>,
    registry: Arc<Mutex<Registry>>,
    children: Mutex<Vec<SpanId>>,
    state: Mutex<SpanState>,
}

/// A causally linked record of one operation.
///
/// Cloning a `Span` is cheap and shares the same underlying record; this is
/// how the ambient context and RPC call sites all observe the same mutable
/// tag/annotation bag for "the current span".
#[derive(Clone)]
pub struct Span(Arc<SpanNode>);

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Span")
            .field("trace_id", &self.0.trace_id)
            .field("span_id", &self.0.span_id)
            .field("parent_id", &self.0.parent_id)
            .finish()
    }
}

impl Span {
    /// A span nobody is listening to; useful as a default ambient value and in tests.
    pub fn noop() -> Self {
        Span::root_with_ids(TraceId::random(), SpanId::random(), None, SpanKind::None, Arc::new(NoopEmitter))
    }

    /// Creates a root span with fresh trace/span ids.
    pub fn root(name: impl Into<String>, kind: SpanKind, emitter: Arc<dyn SpanEmitter>) -> Self {
        let span = Span::root_with_ids(TraceId::random(), SpanId::random(), None, kind, emitter);
        span.0.state.lock().unwrap().name = name.into();
        span
    }

    fn root_with_ids(
        trace_id: TraceId,
        span_id: SpanId,
        parent_id: Option<SpanId>,
        kind: SpanKind,
        emitter: Arc<dyn SpanEmitter>,
    ) -> Self {
        let registry = Arc::new(Mutex::new(Registry { nodes: HashMap::new(), emitter }));
        let node = Arc::new(SpanNode {
            trace_id,
            span_id,
            parent_id,
            registry: registry.clone(),
            children: Mutex::new(Vec::new()),
            state: Mutex::new(SpanState {
                kind,
                name: String::new(),
                start: SystemTime::now(),
                finish: None,
                tags: HashMap::new(),
                annotations: HashMap::new(),
                adapter_overrides: HashMap::new(),
                skip: false,
                error_class: None,
                handled: false,
            }),
        });
        registry.lock().unwrap().nodes.insert(span_id, node.clone());
        Span(node)
    }

    /// Resumes a span lineage from a previously persisted trace/parent id pair,
    /// e.g. a task row that captured its enqueuing caller's trace before an
    /// async handoff. Distinct from [`Span::from_headers`] only in that the
    /// ids come from storage rather than the wire.
    pub fn with_remote_parent(
        trace_id: TraceId,
        parent_id: Option<SpanId>,
        name: impl Into<String>,
        kind: SpanKind,
        emitter: Arc<dyn SpanEmitter>,
    ) -> Self {
        let span = Span::root_with_ids(trace_id, SpanId::random(), parent_id, kind, emitter);
        span.0.state.lock().unwrap().name = name.into();
        span
    }

    /// Parses B3 headers from `extractor`. Missing trace id produces a fresh root.
    pub fn from_headers(extractor: &dyn Extractor, emitter: Arc<dyn SpanEmitter>) -> Self {
        let trace_id = extractor
            .get(crate::b3::HEADER_TRACE_ID)
            .and_then(|v| v.parse::<TraceId>().ok());
        let parent_id = extractor
            .get(crate::b3::HEADER_SPAN_ID)
            .and_then(|v| v.parse::<SpanId>().ok());
        let sampled_zero = extractor.get(crate::b3::HEADER_SAMPLED) == Some("0");

        let span = match trace_id {
            Some(tid) => Span::root_with_ids(tid, SpanId::random(), parent_id, SpanKind::Server, emitter),
            None => Span::root(String::new(), SpanKind::Server, emitter),
        };
        if sampled_zero {
            span.skip();
        }
        span
    }

    /// Emits B3 headers describing this span, suitable for outbound propagation.
    pub fn to_headers(&self, injector: &mut dyn Injector) {
        injector.set(crate::b3::HEADER_TRACE_ID, self.0.trace_id.to_string());
        injector.set(crate::b3::HEADER_SPAN_ID, self.0.span_id.to_string());
        if let Some(parent) = self.0.parent_id {
            injector.set(crate::b3::HEADER_PARENT_SPAN_ID, parent.to_string());
        }
        let sampled = if self.is_skipped() { "0" } else { "1" };
        injector.set(crate::b3::HEADER_SAMPLED, sampled.to_string());
    }

    /// Creates a child span sharing this span's trace and registry.
    pub fn new_child(&self, name: impl Into<String>, kind: SpanKind) -> Self {
        let child_id = SpanId::random();
        let skip_inherited = self.is_skipped();
        let node = Arc::new(SpanNode {
            trace_id: self.0.trace_id,
            span_id: child_id,
            parent_id: Some(self.0.span_id),
            registry: self.0.registry.clone(),
            children: Mutex::new(Vec::new()),
            state: Mutex::new(SpanState {
                kind,
                name: name.into(),
                start: SystemTime::now(),
                finish: None,
                tags: HashMap::new(),
                annotations: HashMap::new(),
                adapter_overrides: HashMap::new(),
                skip: skip_inherited,
                error_class: None,
                handled: false,
            }),
        });
        self.0.registry.lock().unwrap().nodes.insert(child_id, node.clone());
        self.0.children.lock().unwrap().push(child_id);
        Span(node)
    }

    pub fn trace_id(&self) -> TraceId {
        self.0.trace_id
    }

    pub fn id(&self) -> SpanId {
        self.0.span_id
    }

    pub fn parent_id(&self) -> Option<SpanId> {
        self.0.parent_id
    }

    pub fn is_skipped(&self) -> bool {
        self.0.state.lock().unwrap().skip
    }

    pub fn is_finished(&self) -> bool {
        self.0.state.lock().unwrap().finish.is_some()
    }

    pub fn tag(&self, key: impl Into<String>, value: impl Into<String>) {
        self.0.state.lock().unwrap().tags.insert(key.into(), value.into());
    }

    pub fn annotate(&self, kind: impl Into<String>, value: impl Into<String>, ts: Option<SystemTime>) {
        let mut state = self.0.state.lock().unwrap();
        state
            .annotations
            .entry(kind.into())
            .or_default()
            .push(Annotation { value: value.into(), timestamp: ts.unwrap_or_else(SystemTime::now) });
    }

    pub fn set_tag4adapter(&self, adapter: impl Into<String>, key: impl Into<String>, value: impl Into<String>) {
        self.0
            .state
            .lock()
            .unwrap()
            .adapter_overrides
            .entry(adapter.into())
            .or_default()
            .tags
            .insert(key.into(), value.into());
    }

    pub fn annotate4adapter(
        &self,
        adapter: impl Into<String>,
        kind: impl Into<String>,
        value: impl Into<String>,
        ts: Option<SystemTime>,
    ) {
        self.0
            .state
            .lock()
            .unwrap()
            .adapter_overrides
            .entry(adapter.into())
            .or_default()
            .annotations
            .entry(kind.into())
            .or_default()
            .push(Annotation { value: value.into(), timestamp: ts.unwrap_or_else(SystemTime::now) });
    }

    pub fn set_name4adapter(&self, adapter: impl Into<String>, name: impl Into<String>) {
        self.0.state.lock().unwrap().adapter_overrides.entry(adapter.into()).or_default().name = Some(name.into());
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.0.state.lock().unwrap().name = name.into();
    }

    /// Records canonical error tags and the given traceback annotation.
    pub fn error(&self, class: impl Into<String>, message: impl Into<String>, traceback: Option<String>) {
        let class = class.into();
        let message = message.into();
        self.tag("error", "true");
        self.tag("error.class", class.clone());
        self.tag("error.message", message);
        if let Some(tb) = traceback {
            self.annotate("traceback", tb, None);
        }
        self.0.state.lock().unwrap().error_class = Some(class);
    }

    /// Marks this span and every descendant (present and future) as not-to-be-emitted.
    pub fn skip(&self) {
        mark_skip(&self.0);
    }

    /// Finishes the span (idempotent) and cascades emission per the finish/handle rule.
    pub fn finish(&self) {
        {
            let mut state = self.0.state.lock().unwrap();
            if state.finish.is_some() {
                return;
            }
            state.finish = Some(SystemTime::now());
        }
        cascade(&self.0);
    }

    /// Enters this span's scope; dropping the guard finishes the span.
    pub fn enter(self) -> SpanScope {
        SpanScope(self)
    }
}

fn mark_skip(node: &Arc<SpanNode>) {
    node.state.lock().unwrap().skip = true;
    let children: Vec<SpanId> = node.children.lock().unwrap().clone();
    let registry = node.registry.clone();
    for child_id in children {
        let child = registry.lock().unwrap().nodes.get(&child_id).cloned();
        if let Some(child) = child {
            mark_skip(&child);
        }
    }
}

fn parent_handled(node: &Arc<SpanNode>) -> bool {
    match node.parent_id {
        None => true,
        Some(pid) => {
            let reg = node.registry.lock().unwrap();
            reg.nodes.get(&pid).map(|p| p.state.lock().unwrap().handled).unwrap_or(true)
        }
    }
}

fn cascade(node: &Arc<SpanNode>) {
    if !parent_handled(node) {
        return;
    }
    let (finished, already_handled, skip) = {
        let state = node.state.lock().unwrap();
        (state.finish.is_some(), state.handled, state.skip)
    };
    if !finished || already_handled {
        return;
    }
    node.state.lock().unwrap().handled = true;
    if !skip {
        let snapshot = snapshot_of(node);
        let emitter = node.registry.lock().unwrap().emitter.clone();
        emitter.emit(snapshot);
    }
    let children: Vec<SpanId> = node.children.lock().unwrap().clone();
    let registry = node.registry.clone();
    for child_id in children {
        let child = registry.lock().unwrap().nodes.get(&child_id).cloned();
        if let Some(child) = child {
            cascade(&child);
        }
    }
}

fn snapshot_of(node: &Arc<SpanNode>) -> FinishedSpan {
    let state = node.state.lock().unwrap();
    FinishedSpan {
        trace_id: node.trace_id,
        span_id: node.span_id,
        parent_id: node.parent_id,
        kind: state.kind,
        name: state.name.clone(),
        start: state.start,
        finish: state.finish.unwrap_or_else(SystemTime::now),
        tags: state.tags.clone(),
        annotations: state.annotations.clone(),
        adapter_overrides: state.adapter_overrides.clone(),
        error_class: state.error_class.clone(),
    }
}

/// RAII guard returned by [`Span::enter`]; finishes the span on drop.
pub struct SpanScope(Span);

impl SpanScope {
    pub fn span(&self) -> &Span {
        &self.0
    }
}

impl Drop for SpanScope {
    fn drop(&mut self) {
        self.0.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, Default)]
    struct Recording(StdMutex<Vec<FinishedSpan>>);

    impl SpanEmitter for Recording {
        fn emit(&self, span: FinishedSpan) {
            self.0.lock().unwrap().push(span);
        }
    }

    #[test]
    fn root_span_emits_once_on_finish() {
        let sink = Arc::new(Recording::default());
        let span = Span::root("root", SpanKind::Server, sink.clone());
        span.finish();
        span.finish();
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn child_waits_for_parent_handled() {
        let sink = Arc::new(Recording::default());
        let root = Span::root("root", SpanKind::Server, sink.clone());
        let child = root.new_child("child", SpanKind::None);
        child.finish();
        assert!(sink.0.lock().unwrap().is_empty(), "child must wait for the root to be handled");
        root.finish();
        let emitted = sink.0.lock().unwrap();
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0].name, "root");
        assert_eq!(emitted[1].name, "child");
    }

    #[test]
    fn skip_propagates_to_descendants() {
        let sink = Arc::new(Recording::default());
        let root = Span::root("root", SpanKind::Server, sink.clone());
        let child = root.new_child("child", SpanKind::None);
        root.skip();
        child.finish();
        root.finish();
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn header_round_trip_preserves_trace_id_and_sets_parent() {
        let sink = Arc::new(Recording::default());
        let root = Span::root("caller", SpanKind::Client, sink.clone());
        let mut headers = HashMap::new();
        root.to_headers(&mut headers);
        let restored = Span::from_headers(&headers, sink);
        assert_eq!(restored.trace_id(), root.trace_id());
        assert_eq!(restored.parent_id(), Some(root.id()));
    }
}
