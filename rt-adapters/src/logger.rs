use std::sync::{Arc, Mutex};

use futures::future::join_all;
use rt_trace::{FinishedSpan, SpanEmitter, SpanKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::adapter::SpanAdapter;
use crate::error::AdapterError;
use crate::mask::mask_url_value;

type PreHandle = Box<dyn Fn(&mut FinishedSpan) + Send + Sync>;

/// Holds an ordered list of adapters, starts/stops them in parallel, and
/// dispatches every finished span to each adapter sequentially.
///
/// Spans reach the logger through an unbounded channel rather than a direct
/// call, so that `Span::finish` (which may run inside a synchronous `Drop`)
/// never blocks on adapter I/O — the same decoupling a batch span processor
/// uses between `on_end` and the export task.
pub struct Logger {
    adapters: Arc<Vec<Arc<dyn SpanAdapter>>>,
    pre_handle: Arc<Vec<PreHandle>>,
    sender: Mutex<Option<mpsc::UnboundedSender<FinishedSpan>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<FinishedSpan>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger").field("adapters", &self.adapters.len()).finish()
    }
}

impl Logger {
    pub fn new(adapters: Vec<Arc<dyn SpanAdapter>>) -> Arc<Self> {
        Logger::with_pre_handle(adapters, Vec::new())
    }

    /// `extra_pre_handle` callbacks run after the built-in secret-masking pass.
    pub fn with_pre_handle(adapters: Vec<Arc<dyn SpanAdapter>>, extra_pre_handle: Vec<PreHandle>) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut pre_handle: Vec<PreHandle> = vec![Box::new(mask_span as fn(&mut FinishedSpan))];
        pre_handle.extend(extra_pre_handle);
        Arc::new(Logger {
            adapters: Arc::new(adapters),
            pre_handle: Arc::new(pre_handle),
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
            worker: Mutex::new(None),
        })
    }

    pub fn as_emitter(self: &Arc<Self>) -> Arc<dyn SpanEmitter> {
        self.clone()
    }

    /// Convenience: creates a root span emitted through this logger.
    pub fn new_root_span(self: &Arc<Self>, name: impl Into<String>, kind: SpanKind) -> rt_trace::Span {
        rt_trace::Span::root(name, kind, self.as_emitter())
    }

    pub async fn start(self: &Arc<Self>) -> Result<(), AdapterError> {
        let results = join_all(self.adapters.iter().map(|a| a.start())).await;
        for result in results {
            result?;
        }

        let receiver = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .expect("Logger::start called more than once");
        let adapters = self.adapters.clone();
        let pre_handle = self.pre_handle.clone();
        let handle = tokio::spawn(dispatch_loop(receiver, adapters, pre_handle));
        *self.worker.lock().unwrap() = Some(handle);
        Ok(())
    }

    pub async fn stop(&self) {
        self.sender.lock().unwrap().take();
        let worker = self.worker.lock().unwrap().take();
        if let Some(handle) = worker {
            let _ = handle.await;
        }
        join_all(self.adapters.iter().map(|a| a.stop())).await;
    }

    pub fn health(&self) -> Vec<(&'static str, bool)> {
        self.adapters.iter().map(|a| (a.id(), true)).collect()
    }
}

async fn dispatch_loop(
    mut receiver: mpsc::UnboundedReceiver<FinishedSpan>,
    adapters: Arc<Vec<Arc<dyn SpanAdapter>>>,
    pre_handle: Arc<Vec<PreHandle>>,
) {
    while let Some(mut span) = receiver.recv().await {
        for cb in pre_handle.iter() {
            cb(&mut span);
        }
        for adapter in adapters.iter() {
            adapter.handle(&span).await;
        }
    }
}

fn mask_span(span: &mut FinishedSpan) {
    for value in span.tags.values_mut() {
        *value = mask_url_value(value);
    }
    for annotations in span.annotations.values_mut() {
        for annotation in annotations.iter_mut() {
            annotation.value = mask_url_value(&annotation.value);
        }
    }
    for over in span.adapter_overrides.values_mut() {
        for value in over.tags.values_mut() {
            *value = mask_url_value(value);
        }
        for annotations in over.annotations.values_mut() {
            for annotation in annotations.iter_mut() {
                annotation.value = mask_url_value(&annotation.value);
            }
        }
    }
}

impl SpanEmitter for Logger {
    fn emit(&self, span: FinishedSpan) {
        if let Some(tx) = self.sender.lock().unwrap().as_ref() {
            let _ = tx.send(span);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, Default)]
    struct Recording(StdMutex<Vec<String>>);

    #[async_trait]
    impl SpanAdapter for Recording {
        fn id(&self) -> &'static str {
            "test"
        }

        async fn handle(&self, span: &FinishedSpan) {
            self.0.lock().unwrap().push(span.name.clone());
        }
    }

    #[tokio::test]
    async fn dispatches_finished_spans_to_every_adapter() {
        let recorder = Arc::new(Recording::default());
        let logger = Logger::new(vec![recorder.clone()]);
        logger.start().await.unwrap();
        logger.new_root_span("op", SpanKind::Server).finish();
        logger.stop().await;
        assert_eq!(*recorder.0.lock().unwrap(), vec!["op".to_string()]);
    }

    #[tokio::test]
    async fn masks_secret_query_params_before_dispatch() {
        let recorder = Arc::new(Recording::default());
        let logger = Logger::new(vec![recorder.clone()]);
        logger.start().await.unwrap();
        let span = logger.new_root_span("op", SpanKind::Client);
        span.tag("http.url", "https://example.com/login?password=hunter2");
        span.finish();
        logger.stop().await;
        // recorder only tracks names in this test double; a dedicated adapter test
        // (zipkin) asserts the masked tag value directly.
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
    }
}
