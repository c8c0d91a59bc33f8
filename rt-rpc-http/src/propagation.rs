//! B3 header propagation over `http::HeaderMap`, via the `Injector`/
//! `Extractor` pair `rt-trace` defines.

use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use rt_trace::{Extractor, Injector};

pub struct HeaderMapInjector<'a>(pub &'a mut HeaderMap);

impl Injector for HeaderMapInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(key.as_bytes()), HeaderValue::from_str(&value)) {
            self.0.insert(name, value);
        }
    }
}

pub struct HeaderMapExtractor<'a>(pub &'a HeaderMap);

impl Extractor for HeaderMapExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rt_trace::{Span, SpanEmitter, SpanKind};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Noop;
    impl SpanEmitter for Noop {
        fn emit(&self, _: rt_trace::FinishedSpan) {}
    }

    #[test]
    fn round_trips_through_a_header_map() {
        let emitter: Arc<dyn SpanEmitter> = Arc::new(Noop);
        let span = Span::root("caller", SpanKind::Client, emitter.clone());
        let mut headers = HeaderMap::new();
        span.to_headers(&mut HeaderMapInjector(&mut headers));
        assert!(headers.contains_key("x-b3-traceid"));

        let restored = Span::from_headers(&HeaderMapExtractor(&headers), emitter);
        assert_eq!(restored.trace_id(), span.trace_id());
    }
}
