//! OpenRPC (`rpc.discover`) and OpenAPI (`/openapi.json`, `/openapi.yaml`)
//! documents generated from the method registry, plus the `/swagger` and
//! `/redoc` HTML surfaces that render the OpenAPI document interactively.
//! Everything here is cheap to regenerate per request; the registry is
//! frozen by the time discovery is served so there is nothing to cache.

use std::collections::BTreeMap;

use rt_rpc::MethodRegistry;
use serde_json::{json, Value as Json};

/// Builds the OpenRPC document: methods, parameter/result schemas shared via
/// `$ref` the same way [`build_openapi_document`] shares them, declared
/// errors, examples, tags, deprecation.
pub fn build_openrpc_document(registry: &MethodRegistry) -> Json {
    let mut schemas: BTreeMap<String, Json> = BTreeMap::new();

    let methods: Vec<Json> = registry
        .methods()
        .map(|method| {
            let params: Vec<Json> = method
                .params
                .iter()
                .map(|p| {
                    let schema = p.schema.clone().unwrap_or(json!({}));
                    let ref_name = register_schema(&mut schemas, to_pascal_case(&p.name), schema);
                    json!({
                        "name": p.name,
                        "required": p.is_required(),
                        "schema": {"$ref": format!("#/components/schemas/{ref_name}")},
                    })
                })
                .collect();
            let errors: Vec<Json> =
                method.errors.iter().map(|e| json!({"code": e.code, "message": e.message})).collect();
            let result_schema = method.result_schema.clone().unwrap_or(json!({}));
            let result_ref =
                register_schema(&mut schemas, format!("{}Result", to_pascal_case(&method.name)), result_schema);
            json!({
                "name": method.name,
                "summary": method.summary,
                "description": method.description,
                "deprecated": method.deprecated,
                "tags": method.tags.iter().map(|t| json!({"name": t})).collect::<Vec<_>>(),
                "params": params,
                "result": {"name": "result", "schema": {"$ref": format!("#/components/schemas/{result_ref}")}},
                "errors": errors,
                "examples": method.examples,
            })
        })
        .collect();

    json!({
        "openrpc": "1.2.6",
        "info": {"title": "rpc", "version": "1.0.0"},
        "methods": methods,
        "components": {"schemas": schemas},
    })
}

/// Interns `schema` under `preferred_name`, reusing that name if it already
/// maps to an identical schema (cross-method sharing) and otherwise probing
/// `{preferred_name}2`, `{preferred_name}3`, ... for either a matching
/// schema to reuse or a free slot to claim.
fn register_schema(schemas: &mut BTreeMap<String, Json>, preferred_name: String, schema: Json) -> String {
    let preferred_name = if preferred_name.is_empty() { "Schema".to_string() } else { preferred_name };
    match schemas.get(&preferred_name) {
        Some(existing) if *existing == schema => preferred_name,
        None => {
            schemas.insert(preferred_name.clone(), schema);
            preferred_name
        }
        Some(_) => {
            let mut n = 2;
            loop {
                let candidate = format!("{preferred_name}{n}");
                match schemas.get(&candidate) {
                    Some(existing) if *existing == schema => return candidate,
                    Some(_) => n += 1,
                    None => {
                        schemas.insert(candidate.clone(), schema);
                        return candidate;
                    }
                }
            }
        }
    }
}

/// Builds the OpenAPI document backing the positional-RPC discovery surfaces
/// (`/openapi.json`, `/openapi.yaml`): one `POST {base}/{method}` path entry
/// per registered method, with request/response schemas shared via `$ref`
/// where the same parameter schema recurs.
pub fn build_openapi_document(registry: &MethodRegistry, base_path: &str) -> Json {
    let mut paths = serde_json::Map::new();
    let mut schemas: BTreeMap<String, Json> = BTreeMap::new();

    for method in registry.methods() {
        let schema_name = format!("{}Params", to_pascal_case(&method.name));
        let properties: serde_json::Map<String, Json> = method
            .params
            .iter()
            .map(|p| (p.name.clone(), p.schema.clone().unwrap_or(json!({}))))
            .collect();
        let required: Vec<String> = method.params.iter().filter(|p| p.is_required()).map(|p| p.name.clone()).collect();
        schemas.insert(schema_name.clone(), json!({"type": "object", "properties": properties, "required": required}));

        paths.insert(
            format!("{base_path}/{}", method.name),
            json!({
                "post": {
                    "summary": method.summary,
                    "description": method.description,
                    "deprecated": method.deprecated,
                    "requestBody": {
                        "content": {"application/json": {"schema": {"$ref": format!("#/components/schemas/{schema_name}")}}}
                    },
                    "responses": {
                        "200": {"description": "success"},
                        "400": {"description": "invalid arguments"},
                        "404": {"description": "method not found"},
                        "500": {"description": "server error"},
                    },
                }
            }),
        );
    }

    json!({
        "openapi": "3.0.3",
        "info": {"title": "rpc", "version": "1.0.0"},
        "paths": Json::Object(paths),
        "components": {"schemas": schemas},
    })
}

/// A Swagger UI page pointed at `openapi_path`, loaded from the public CDN
/// bundle rather than vendored so the server stays a single small binary.
pub fn swagger_ui_html(openapi_path: &str) -> String {
    format!(
        r##"<!DOCTYPE html>
<html>
<head>
  <title>API docs</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist/swagger-ui-bundle.js"></script>
  <script>
    window.onload = () => SwaggerUIBundle({{ url: "{openapi_path}", dom_id: "#swagger-ui" }});
  </script>
</body>
</html>"##
    )
}

/// A ReDoc page pointed at `openapi_path`.
pub fn redoc_html(openapi_path: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>API docs</title>
</head>
<body>
  <redoc spec-url="{openapi_path}"></redoc>
  <script src="https://cdn.redoc.ly/redoc/latest/bundles/redoc.standalone.js"></script>
</body>
</html>"#
    )
}

fn to_pascal_case(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rt_rpc::{ParamSpec, RpcMethod, RpcValue};
    use std::collections::BTreeMap as Map;
    use std::sync::Arc;

    fn registry() -> MethodRegistry {
        let mut registry = MethodRegistry::new();
        registry.register(
            RpcMethod::new("user.get", Arc::new(|_: Map<String, RpcValue>| async move { Ok(RpcValue::Null) }))
                .with_params(vec![ParamSpec::required("id")]),
        );
        registry
    }

    #[test]
    fn openrpc_document_lists_every_registered_method() {
        let doc = build_openrpc_document(&registry());
        assert_eq!(doc["methods"].as_array().unwrap().len(), 1);
        assert_eq!(doc["methods"][0]["name"], json!("user.get"));
    }

    #[test]
    fn openapi_document_has_one_path_per_method() {
        let doc = build_openapi_document(&registry(), "/rpc");
        assert!(doc["paths"]["/rpc/user.get"].is_object());
        assert!(doc["components"]["schemas"]["UserGetParams"].is_object());
    }

    #[test]
    fn openrpc_document_surfaces_method_tags() {
        let mut registry = MethodRegistry::new();
        registry.register(
            RpcMethod::new("user.get", Arc::new(|_: Map<String, RpcValue>| async move { Ok(RpcValue::Null) }))
                .with_tags(vec!["users".to_string()]),
        );
        let doc = build_openrpc_document(&registry);
        assert_eq!(doc["methods"][0]["tags"], json!([{"name": "users"}]));
    }

    #[test]
    fn openrpc_document_shares_identical_param_schemas_by_ref() {
        let mut registry = MethodRegistry::new();
        let id_schema = json!({"type": "string"});
        registry.register(
            RpcMethod::new("user.get", Arc::new(|_: Map<String, RpcValue>| async move { Ok(RpcValue::Null) }))
                .with_params(vec![ParamSpec::required("id").with_schema(id_schema.clone())]),
        );
        registry.register(
            RpcMethod::new("user.delete", Arc::new(|_: Map<String, RpcValue>| async move { Ok(RpcValue::Null) }))
                .with_params(vec![ParamSpec::required("id").with_schema(id_schema.clone())]),
        );

        let doc = build_openrpc_document(&registry);
        let schemas = doc["components"]["schemas"].as_object().unwrap();
        let id_entries: Vec<_> = schemas.values().filter(|s| **s == id_schema).collect();
        assert_eq!(id_entries.len(), 1, "identical schemas should collapse to a single $ref target");

        for method in doc["methods"].as_array().unwrap() {
            let param_ref = method["params"][0]["schema"]["$ref"].as_str().unwrap();
            let name = param_ref.rsplit('/').next().unwrap();
            assert_eq!(schemas[name], id_schema);
        }
    }
}
