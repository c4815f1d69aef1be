use indexmap::IndexMap;

pub const EXT_JSON_SERIALIZER: &str = "x-json-serializer";
pub const EXT_VALIDATION_CONSTRAINT: &str = "x-validation-constraint";
pub const EXT_NULLABLE: &str = "x-nullable";
pub const EXT_MODEL_SUBDIR: &str = "x-model-subdir";
pub const EXT_DEPRECATION_MESSAGE: &str = "x-deprecation-message";

/// Read-only view over a node's vendor extensions.
///
/// Values of the wrong JSON type are ignored with a warning rather than
/// failing the run; extensions are hints, not type information.
#[derive(Debug, Clone, Copy)]
pub struct Extensions<'a> {
    values: &'a IndexMap<String, serde_json::Value>,
}

impl<'a> Extensions<'a> {
    pub fn new(values: &'a IndexMap<String, serde_json::Value>) -> Self {
        Self { values }
    }

    /// A non-blank string extension.
    pub fn string(&self, name: &str) -> Option<&'a str> {
        match self.values.get(name)? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.as_str()),
            serde_json::Value::String(_) => None,
            other => {
                log::warn!("extension {name} is not a string: {other}");
                None
            }
        }
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.values.get(name)? {
            serde_json::Value::Bool(b) => Some(*b),
            other => {
                log::warn!("extension {name} is not a boolean: {other}");
                None
            }
        }
    }
}
