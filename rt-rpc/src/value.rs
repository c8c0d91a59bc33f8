//! The canonical serialization rule set: a value handed back
//! from a handler, or bound from an incoming argument, passes through
//! [`RpcValue`] so that `bytes`, dates, `Decimal`, and `Url` get one fixed
//! on-the-wire shape regardless of which transport carries them.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// The constant prefix marking a base64-encoded byte string, per §4.5.
pub const BASE64_MARKER: &str = "data:application/octet-stream;base64,";

#[derive(Debug, Clone, PartialEq)]
pub enum RpcValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<Utc>),
    Decimal(Decimal),
    Url(url::Url),
    Array(Vec<RpcValue>),
    Object(BTreeMap<String, RpcValue>),
}

impl RpcValue {
    /// Recursively lowers to a `serde_json::Value` applying the canonical
    /// rule set: structured values become field maps (already true of
    /// `Object`), bytes become base64-marker strings, dates ISO-8601,
    /// decimals numbers, URLs strings.
    pub fn to_canonical_json(&self) -> Json {
        match self {
            RpcValue::Null => Json::Null,
            RpcValue::Bool(b) => Json::Bool(*b),
            RpcValue::Int(i) => Json::Number((*i).into()),
            RpcValue::Float(f) => serde_json::Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
            RpcValue::String(s) => Json::String(s.clone()),
            RpcValue::Bytes(bytes) => Json::String(format!("{BASE64_MARKER}{}", BASE64.encode(bytes))),
            RpcValue::DateTime(dt) => Json::String(dt.to_rfc3339()),
            RpcValue::Decimal(d) => d
                .to_string()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Json::Number)
                .unwrap_or_else(|| Json::String(d.to_string())),
            RpcValue::Url(u) => Json::String(u.to_string()),
            RpcValue::Array(items) => Json::Array(items.iter().map(RpcValue::to_canonical_json).collect()),
            RpcValue::Object(fields) => {
                Json::Object(fields.iter().map(|(k, v)| (k.clone(), v.to_canonical_json())).collect())
            }
        }
    }

    /// Builds an `RpcValue` from ingress JSON, reversing the base64-marker
    /// rule only when `expect_bytes` says the target parameter is `bytes`
    /// typed — an ordinary string that happens to start with the marker
    /// text is otherwise left alone.
    pub fn from_json(value: &Json, expect_bytes: bool) -> Result<RpcValue, String> {
        match value {
            Json::Null => Ok(RpcValue::Null),
            Json::Bool(b) => Ok(RpcValue::Bool(*b)),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(RpcValue::Int(i))
                } else {
                    Ok(RpcValue::Float(n.as_f64().unwrap_or_default()))
                }
            }
            Json::String(s) => {
                if expect_bytes {
                    let encoded = s.strip_prefix(BASE64_MARKER).unwrap_or(s);
                    BASE64.decode(encoded).map(RpcValue::Bytes).map_err(|e| format!("invalid base64: {e}"))
                } else {
                    Ok(RpcValue::String(s.clone()))
                }
            }
            Json::Array(items) => {
                items.iter().map(|v| RpcValue::from_json(v, false)).collect::<Result<_, _>>().map(RpcValue::Array)
            }
            Json::Object(fields) => fields
                .iter()
                .map(|(k, v)| RpcValue::from_json(v, false).map(|v| (k.clone(), v)))
                .collect::<Result<_, _>>()
                .map(RpcValue::Object),
        }
    }
}

impl Serialize for RpcValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_canonical_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RpcValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let json = Json::deserialize(deserializer)?;
        RpcValue::from_json(&json, false).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_round_trip_through_base64_marker() {
        let original = RpcValue::Bytes(vec![1, 2, 3, 255]);
        let json = original.to_canonical_json();
        let s = json.as_str().unwrap();
        assert!(s.starts_with(BASE64_MARKER));
        let restored = RpcValue::from_json(&json, true).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn plain_string_is_untouched_when_not_expecting_bytes() {
        let json = Json::String("hello".to_string());
        let v = RpcValue::from_json(&json, false).unwrap();
        assert_eq!(v, RpcValue::String("hello".to_string()));
    }

    #[test]
    fn url_lowers_to_its_string_form() {
        let u = url::Url::parse("https://example.com/a").unwrap();
        let v = RpcValue::Url(u.clone());
        assert_eq!(v.to_canonical_json(), Json::String(u.to_string()));
    }

    #[test]
    fn datetime_lowers_to_iso8601() {
        let dt = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z").unwrap().with_timezone(&Utc);
        let v = RpcValue::DateTime(dt);
        assert_eq!(v.to_canonical_json(), Json::String(dt.to_rfc3339()));
    }
}
