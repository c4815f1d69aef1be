use std::collections::BTreeSet;

use serde::Serialize;

use super::types::{DiscriminatorPlan, EnumVariant, MappedType, NormalizedName, Primitive};

/// Deprecation marker with an optional replacement hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deprecation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One property of a record model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldPlan {
    pub name: NormalizedName,
    /// Identifier in the configured field case.
    pub ident: String,
    /// Property name as it appears on the wire.
    pub wire_name: String,
    pub mapped: MappedType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<Deprecation>,
    pub read_only: bool,
    pub write_only: bool,
    /// The field is itself a reference to a type in a reference cycle.
    pub requires_indirection: bool,
}

/// Shape of a model file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelBody {
    Record {
        fields: Vec<FieldPlan>,
        #[serde(skip_serializing_if = "Option::is_none")]
        additional_properties: Option<MappedType>,
    },
    Enumeration {
        base: Primitive,
        variants: Vec<EnumVariant>,
    },
    Union {
        variants: Vec<MappedType>,
        #[serde(skip_serializing_if = "Option::is_none")]
        discriminator: Option<DiscriminatorPlan>,
    },
}

/// Plan for one named schema component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelFilePlan {
    /// Target type name.
    pub name: String,
    /// Canonical name in the registry.
    pub schema_name: String,
    pub module_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<Deprecation>,
    pub body: ModelBody,
    /// Target names of `allOf` parents.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub supertypes: Vec<String>,
    pub requires_indirection: bool,
    /// Other registry schemas this file refers to, never itself.
    pub references: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub external_imports: BTreeSet<String>,
}

impl ModelFilePlan {
    pub fn fields(&self) -> &[FieldPlan] {
        match &self.body {
            ModelBody::Record { fields, .. } => fields,
            _ => &[],
        }
    }

    pub fn field(&self, wire_name: &str) -> Option<&FieldPlan> {
        self.fields().iter().find(|f| f.wire_name == wire_name)
    }

    /// Wire literals of an enumeration model, in declared order.
    pub fn enum_wire_values(&self) -> Option<Vec<&serde_json::Value>> {
        match &self.body {
            ModelBody::Enumeration { variants, .. } => {
                Some(variants.iter().map(|v| &v.value).collect())
            }
            _ => None,
        }
    }
}
