use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported OpenAPI version: {0}")]
    UnsupportedVersion(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml_ng::Error,
    },
}

/// A fatal planning failure. Every variant names the schema, property path
/// or operation it came from; the first one raised aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("unresolved reference '{reference}' (from {referenced_from})")]
    UnresolvedReference {
        reference: String,
        referenced_from: String,
    },

    #[error("schema name '{name}' is registered twice")]
    DuplicateName { name: String },

    #[error("name '{name}' is claimed by both '{first}' and '{second}'")]
    NameCollision {
        name: String,
        first: String,
        second: String,
    },

    #[error("map at {location} has unsupported key type {key_type}; only string-like keys are allowed")]
    UnsupportedKeyType { location: String, key_type: String },

    #[error("schema '{schema}' merges field '{field}' with incompatible types")]
    DuplicateField { schema: String, field: String },

    #[error(
        "operation '{operation_id}': path parameters do not match template '{path}' (missing: {missing:?}, undeclared: {undeclared:?})"
    )]
    PathParameterMismatch {
        operation_id: String,
        path: String,
        /// Template slots with no path parameter declared.
        missing: Vec<String>,
        /// Path parameters with no slot in the template.
        undeclared: Vec<String>,
    },

    #[error(
        "operation '{operation_id}': request body media types '{first}' and '{second}' map to incompatible types"
    )]
    MultipleBodyMediaTypesConflict {
        operation_id: String,
        first: String,
        second: String,
    },

    #[error("schema '{schema}' declares no properties")]
    EmptySchema { schema: String },

    #[error("reference cycle cannot be ordered: {names:?}")]
    CyclicReferenceUnsupported { names: Vec<String> },

    #[error("unsupported schema at {location}: {reason}")]
    UnsupportedSchema { location: String, reason: String },
}

impl PlanError {
    pub(crate) fn unresolved(reference: impl Into<String>, from: impl Into<String>) -> Self {
        PlanError::UnresolvedReference {
            reference: reference.into(),
            referenced_from: from.into(),
        }
    }

    pub(crate) fn unsupported(location: impl Into<String>, reason: impl Into<String>) -> Self {
        PlanError::UnsupportedSchema {
            location: location.into(),
            reason: reason.into(),
        }
    }
}
