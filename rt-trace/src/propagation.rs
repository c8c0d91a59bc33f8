//! Carrier abstractions for reading and writing propagation headers.
//!
//! A [`Span`](crate::Span) does not know whether it is being carried over an
//! HTTP header map, an AMQP message's `headers` table, or a plain
//! `HashMap` used to stash trace context on a scheduled task row. Transports
//! implement [`Injector`]/[`Extractor`] for their native carrier type instead.

use std::collections::HashMap;
use std::hash::BuildHasher;

/// Writes propagation fields into a carrier.
pub trait Injector {
    fn set(&mut self, key: &str, value: String);
}

/// Reads propagation fields out of a carrier.
pub trait Extractor {
    fn get(&self, key: &str) -> Option<&str>;
}

impl<S: BuildHasher> Injector for HashMap<String, String, S> {
    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_ascii_lowercase(), value);
    }
}

impl<S: BuildHasher> Extractor for HashMap<String, String, S> {
    fn get(&self, key: &str) -> Option<&str> {
        HashMap::get(self, &key.to_ascii_lowercase()).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_map_carrier_is_case_insensitive() {
        let mut carrier: HashMap<String, String> = HashMap::new();
        carrier.set("X-B3-TraceId", "abc".to_string());
        assert_eq!(Extractor::get(&carrier, "x-b3-traceid"), Some("abc"));
    }
}
