//! B3 propagation over an AMQP message's `headers` property.
//!
//! Injection writes directly into a `lapin::types::FieldTable` via the
//! `Injector` contract; extraction goes through a plain `HashMap`, reusing
//! `rt-trace`'s blanket `Extractor` impl for it rather than growing a second
//! carrier-specific implementation with the same semantics.

use std::collections::HashMap;

use lapin::types::{AMQPValue, FieldTable, LongString};
use rt_trace::Injector;

pub struct FieldTableInjector<'a>(pub &'a mut FieldTable);

impl Injector for FieldTableInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.0.insert(key.into(), AMQPValue::LongString(LongString::from(value)));
    }
}

/// Collects the subset of `table` usable as B3 headers into an owned map.
pub fn headers_to_map(table: &FieldTable) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for (key, value) in table.inner().iter() {
        if let AMQPValue::LongString(s) = value {
            if let Ok(s) = String::from_utf8(s.as_bytes().to_vec()) {
                map.insert(key.to_string(), s);
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injector_round_trips_through_headers_to_map() {
        let mut table = FieldTable::default();
        let mut injector = FieldTableInjector(&mut table);
        injector.set("x-b3-traceid", "abc123".to_string());
        let map = headers_to_map(&table);
        assert_eq!(map.get("x-b3-traceid").map(String::as_str), Some("abc123"));
    }
}
