//! Argument binding: positional or by-name calling
//! conventions, defaults, coercion of `bytes` parameters, and minimal
//! JSON-schema validation — all before the handler ever runs.

use std::collections::BTreeMap;

use serde_json::{Map, Value as Json};

use crate::error::RpcError;
use crate::param::ParamSpec;
use crate::schema;
use crate::value::RpcValue;

/// The two calling conventions §4.5 supports.
pub enum CallArgs {
    Positional(Vec<Json>),
    Named(Map<String, Json>),
    None,
}

/// Binds `args` against `params`, returning one [`RpcValue`] per declared
/// parameter name, in declaration order already resolved to canonical
/// values (bytes decoded, schema-validated).
pub fn bind(params: &[ParamSpec], args: CallArgs) -> Result<BTreeMap<String, RpcValue>, RpcError> {
    let mut by_name: Map<String, Json> = match args {
        CallArgs::None => Map::new(),
        CallArgs::Named(map) => map,
        CallArgs::Positional(values) => {
            if values.len() > params.len() {
                return Err(RpcError::InvalidArguments(format!(
                    "Got an unexpected argument: positional index {}",
                    params.len()
                )));
            }
            params.iter().zip(values).map(|(p, v)| (p.name.clone(), v)).collect()
        }
    };

    let declared: std::collections::HashSet<&str> = params.iter().map(|p| p.name.as_str()).collect();
    let mut unknown: Vec<&String> = by_name.keys().filter(|k| !declared.contains(k.as_str())).collect();
    unknown.sort();
    if let Some(first) = unknown.first() {
        return Err(RpcError::InvalidArguments(format!("Got an unexpected argument: {first}")));
    }

    let mut missing = Vec::new();
    let mut bound = BTreeMap::new();
    for param in params {
        let raw = match by_name.remove(&param.name) {
            Some(v) => v,
            None => match &param.default {
                Some(default) => default.clone(),
                None => {
                    missing.push(param.name.clone());
                    continue;
                }
            },
        };

        if let Some(schema) = &param.schema {
            schema::validate(schema, &raw).map_err(|reason| {
                RpcError::InvalidArguments(format!("argument {:?} is invalid: {reason}", param.name))
            })?;
        }

        let value = RpcValue::from_json(&raw, param.is_bytes)
            .map_err(|reason| RpcError::InvalidArguments(format!("argument {:?}: {reason}", param.name)))?;
        bound.insert(param.name.clone(), value);
    }

    if !missing.is_empty() {
        return Err(RpcError::InvalidArguments(format!(
            "Missing {} required argument(s): {}",
            missing.len(),
            missing.join(", ")
        )));
    }

    Ok(bound)
}
