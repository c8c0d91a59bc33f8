//! A minimal JSON-schema validator covering the constraint shapes method
//! declarations actually use: `type`, `enum`, `minimum`/`maximum`,
//! `minLength`/`maxLength`, `pattern`. Not a general JSON-Schema
//! implementation — see SPEC_FULL.md §4.5 for why a full validator crate
//! was not pulled in for this.

use regex::Regex;
use serde_json::Value as Json;

/// Validates `value` against `schema`; `Ok(())` or a human-readable reason.
pub fn validate(schema: &Json, value: &Json) -> Result<(), String> {
    let Json::Object(constraints) = schema else {
        return Ok(());
    };

    if let Some(expected) = constraints.get("type").and_then(Json::as_str) {
        if !matches_type(expected, value) {
            return Err(format!("expected type {expected}, got {}", type_name(value)));
        }
    }

    if let Some(allowed) = constraints.get("enum").and_then(Json::as_array) {
        if !allowed.contains(value) {
            return Err(format!("{value} is not one of the allowed values"));
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = constraints.get("minimum").and_then(Json::as_f64) {
            if n < min {
                return Err(format!("{n} is less than minimum {min}"));
            }
        }
        if let Some(max) = constraints.get("maximum").and_then(Json::as_f64) {
            if n > max {
                return Err(format!("{n} is greater than maximum {max}"));
            }
        }
    }

    if let Some(s) = value.as_str() {
        if let Some(min_len) = constraints.get("minLength").and_then(Json::as_u64) {
            if (s.chars().count() as u64) < min_len {
                return Err(format!("string shorter than minLength {min_len}"));
            }
        }
        if let Some(max_len) = constraints.get("maxLength").and_then(Json::as_u64) {
            if (s.chars().count() as u64) > max_len {
                return Err(format!("string longer than maxLength {max_len}"));
            }
        }
        if let Some(pattern) = constraints.get("pattern").and_then(Json::as_str) {
            let re = Regex::new(pattern).map_err(|e| format!("invalid pattern in schema: {e}"))?;
            if !re.is_match(s) {
                return Err(format!("{s:?} does not match pattern {pattern:?}"));
            }
        }
    }

    Ok(())
}

fn type_name(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn matches_type(expected: &str, value: &Json) -> bool {
    match expected {
        "integer" => matches!(value, Json::Number(n) if n.is_i64() || n.is_u64()),
        "number" => value.is_number(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}
