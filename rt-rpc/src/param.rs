use serde_json::Value as Json;

/// One declared parameter of an [`crate::RpcMethod`].
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub default: Option<Json>,
    pub is_bytes: bool,
    pub schema: Option<Json>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>) -> Self {
        ParamSpec { name: name.into(), default: None, is_bytes: false, schema: None }
    }

    pub fn with_default(mut self, default: Json) -> Self {
        self.default = Some(default);
        self
    }

    pub fn bytes(mut self) -> Self {
        self.is_bytes = true;
        self
    }

    pub fn with_schema(mut self, schema: Json) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}
