use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ir::NormalizedName;

/// Project configuration loaded from `.dtoplan.yaml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub input: String,
    pub output: String,
    pub plan: PlanConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            input: "openapi.yaml".to_string(),
            output: "plan.yaml".to_string(),
            plan: PlanConfig::default(),
        }
    }
}

/// Everything the planners consult. Passed by reference through the whole
/// pipeline; nothing here is read from global state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Prefix for qualified import paths (`<root_package>.model.Foo`).
    pub root_package: String,
    /// Appended to every model type name (`Order` → `OrderDto`).
    pub model_suffix: String,
    pub naming: NamingConfig,
    pub grouping: GroupingConfig,
    pub ordering: EmissionOrdering,
    pub empty_schema: EmptySchemaPolicy,
    /// Emit validation descriptors (not-null, size, pattern, ...).
    pub validation_annotations: bool,
    /// Promote inline objects/enums nested in component schemas to named types.
    pub promote_inline: bool,
    /// Plan schemas and operations on the rayon pool.
    pub parallel: bool,
    /// Schema name → externally provided type.
    pub type_overrides: IndexMap<String, TypeOverride>,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            root_package: "generated".to_string(),
            model_suffix: String::new(),
            naming: NamingConfig::default(),
            grouping: GroupingConfig::default(),
            ordering: EmissionOrdering::CycleTolerant,
            empty_schema: EmptySchemaPolicy::Allow,
            validation_annotations: true,
            promote_inline: true,
            parallel: true,
            type_overrides: IndexMap::new(),
        }
    }
}

impl PlanConfig {
    /// Target type name for a model schema.
    pub fn model_type_name(&self, name: &NormalizedName) -> String {
        format!("{}{}", self.naming.type_case.apply(name), self.model_suffix)
    }

    /// Target identifier for a field or parameter.
    pub fn field_ident(&self, name: &NormalizedName) -> String {
        self.naming.field_case.apply(name)
    }
}

/// Identifier casing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Case {
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    /// Keep the sanitized source spelling.
    Preserve,
}

impl Case {
    pub fn apply(self, name: &NormalizedName) -> String {
        match self {
            Case::Pascal => name.pascal_case.clone(),
            Case::Camel => name.camel_case.clone(),
            Case::Snake => name.snake_case.clone(),
            Case::ScreamingSnake => name.screaming_snake.clone(),
            Case::Preserve => name.sanitized.clone(),
        }
    }
}

/// Naming conventions and operation naming.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub type_case: Case,
    pub field_case: Case,
    pub enum_variants: Case,
    pub strategy: NamingStrategy,
    /// Map from resolved operation name (operationId or route-derived) to custom alias.
    pub aliases: IndexMap<String, String>,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            type_case: Case::Pascal,
            field_case: Case::Camel,
            enum_variants: Case::ScreamingSnake,
            strategy: NamingStrategy::UseOperationId,
            aliases: IndexMap::new(),
        }
    }
}

/// How operation names are derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingStrategy {
    #[default]
    UseOperationId,
    UseRouteBased,
}

/// How operations are grouped into interfaces.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    pub by: GroupBy,
    /// Group key for operations without tags.
    pub default_key: String,
    pub interface_suffix: String,
    /// Only plan these groups; empty means all.
    pub include_tags: Vec<String>,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            by: GroupBy::Tag,
            default_key: "default".to_string(),
            interface_suffix: "Api".to_string(),
            include_tags: Vec::new(),
        }
    }
}

/// Strategy for grouping operations into interfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    /// One interface per first tag.
    #[default]
    Tag,
    /// One interface per first path segment.
    Route,
    /// One interface per operation.
    Operation,
}

/// Ordering contract for the emitted file sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmissionOrdering {
    /// Every import precedes its importer; cycles are an error.
    Strict,
    /// Cycles are collected into forward-reference groups.
    #[default]
    CycleTolerant,
}

/// What to do with object schemas that declare no properties.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptySchemaPolicy {
    #[default]
    Allow,
    Warn,
    Error,
}

/// A caller-supplied type standing in for a named schema.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TypeOverride {
    pub type_name: String,
    #[serde(default)]
    pub import: Option<String>,
}

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = ".dtoplan.yaml";

/// Load config from a YAML file. Returns `None` if the file doesn't exist.
pub fn load_config(path: &Path) -> Result<Option<ProjectConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config: ProjectConfig =
        serde_yaml_ng::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.display().to_string(),
            source,
        })?;
    Ok(Some(config))
}

/// Generate the default config file content.
pub fn default_config_content() -> &'static str {
    r#"# dtoplan configuration
input: openapi.yaml
output: plan.yaml

plan:
  root_package: generated
  model_suffix: ""            # e.g. Dto → OrderDto
  naming:
    type_case: pascal
    field_case: camel           # camel | snake | pascal | preserve
    enum_variants: screaming_snake
    strategy: use_operation_id  # use_operation_id | use_route_based
    aliases: {}
  grouping:
    by: tag                     # tag | route | operation
    default_key: default
    interface_suffix: Api
    include_tags: []
  ordering: cycle_tolerant      # strict | cycle_tolerant
  empty_schema: allow           # allow | warn | error
  validation_annotations: true
  promote_inline: true
  parallel: true
  type_overrides: {}
    # Money:
    #   type_name: Money
    #   import: com.example.types.Money
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::name_normalizer::normalize_name;

    #[test]
    fn test_default_config() {
        let config = ProjectConfig::default();
        assert_eq!(config.input, "openapi.yaml");
        assert_eq!(config.plan.root_package, "generated");
        assert_eq!(config.plan.naming.strategy, NamingStrategy::UseOperationId);
        assert_eq!(config.plan.grouping.by, GroupBy::Tag);
        assert_eq!(config.plan.ordering, EmissionOrdering::CycleTolerant);
        assert_eq!(config.plan.empty_schema, EmptySchemaPolicy::Allow);
        assert!(config.plan.validation_annotations);
        assert!(config.plan.type_overrides.is_empty());
    }

    #[test]
    fn test_default_content_parses() {
        let config: ProjectConfig = serde_yaml_ng::from_str(default_config_content()).unwrap();
        assert_eq!(config.output, "plan.yaml");
        assert_eq!(config.plan.grouping.interface_suffix, "Api");
        assert_eq!(config.plan.naming.enum_variants, Case::ScreamingSnake);
    }

    #[test]
    fn test_parse_config_yaml() {
        let yaml = r#"
input: spec.yaml
plan:
  root_package: org.example
  model_suffix: Dto
  naming:
    field_case: snake
    strategy: use_route_based
    aliases:
      getTickets: listTickets
  grouping:
    by: route
    include_tags: [tickets]
  ordering: strict
  empty_schema: error
  type_overrides:
    Money:
      type_name: Money
      import: com.example.Money
"#;
        let config: ProjectConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.input, "spec.yaml");
        assert_eq!(config.output, "plan.yaml");
        let plan = &config.plan;
        assert_eq!(plan.root_package, "org.example");
        assert_eq!(plan.naming.field_case, Case::Snake);
        assert_eq!(plan.naming.aliases["getTickets"], "listTickets");
        assert_eq!(plan.grouping.by, GroupBy::Route);
        assert_eq!(plan.grouping.include_tags, vec!["tickets".to_string()]);
        assert_eq!(plan.ordering, EmissionOrdering::Strict);
        assert_eq!(plan.empty_schema, EmptySchemaPolicy::Error);
        assert_eq!(
            plan.type_overrides["Money"].import.as_deref(),
            Some("com.example.Money")
        );
        assert_eq!(plan.model_type_name(&normalize_name("order-v1")), "OrderV1Dto");
        assert_eq!(plan.field_ident(&normalize_name("createdTime")), "created_time");
    }

    #[test]
    fn test_missing_file_is_none() {
        let loaded = load_config(Path::new("/definitely/not/here/.dtoplan.yaml")).unwrap();
        assert!(loaded.is_none());
    }
}
