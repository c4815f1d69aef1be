use crate::error::PlanError;
use crate::parse::extensions::{
    EXT_DEPRECATION_MESSAGE, Extensions, EXT_JSON_SERIALIZER, EXT_MODEL_SUBDIR, EXT_NULLABLE,
    EXT_VALIDATION_CONSTRAINT,
};
use crate::parse::schema::{
    AdditionalProperties, Discriminator, ExclusiveBound, Schema, SchemaOrRef, SchemaType, TypeSet,
};

const COMPONENT_SCHEMA_PREFIX: &str = "#/components/schemas/";

/// A node in the document's schema graph.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: NodeKind,
    pub meta: NodeMeta,
}

/// Base type of a scalar or enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Integer,
    Number,
    Boolean,
    /// No `type` keyword, or several non-null types.
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeMode {
    OneOf,
    AnyOf,
    AllOf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub node: SchemaNode,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Scalar(ScalarKind),
    Object {
        properties: Vec<Property>,
        /// Extra keys next to declared properties.
        additional: Option<Box<SchemaNode>>,
    },
    Enum {
        base: ScalarKind,
        values: Vec<serde_json::Value>,
    },
    Array {
        items: Box<SchemaNode>,
    },
    Map {
        key: Box<SchemaNode>,
        value: Box<SchemaNode>,
    },
    /// Name-keyed lookup into the registry.
    Reference {
        name: String,
    },
    Composite {
        mode: CompositeMode,
        parts: Vec<SchemaNode>,
        discriminator: Option<Discriminator>,
    },
}

/// Numeric bound with its exclusivity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub value: f64,
    pub exclusive: bool,
}

/// Keywords that refine a node without changing its kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeMeta {
    pub format: Option<String>,
    pub pattern: Option<String>,
    pub minimum: Option<Bound>,
    pub maximum: Option<Bound>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,
    pub nullable: bool,
    pub deprecated: bool,
    pub deprecation_message: Option<String>,
    pub description: Option<String>,
    pub default_value: Option<serde_json::Value>,
    pub read_only: bool,
    pub write_only: bool,
    pub json_serializer: Option<String>,
    pub validation_constraint: Option<String>,
    pub model_subdir: Option<String>,
}

impl SchemaNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            meta: NodeMeta::default(),
        }
    }

    pub fn scalar(kind: ScalarKind) -> Self {
        Self::new(NodeKind::Scalar(kind))
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::new(NodeKind::Reference { name: name.into() })
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.meta.format = Some(format.to_string());
        self
    }

    pub fn nullable(mut self) -> Self {
        self.meta.nullable = true;
        self
    }

    /// Convert a parsed schema. `location` names the schema or property path
    /// for diagnostics.
    pub fn from_schema_or_ref(schema: &SchemaOrRef, location: &str) -> Result<Self, PlanError> {
        match schema {
            SchemaOrRef::Ref {
                ref_path,
                description,
                extensions,
            } => {
                let name = component_name(ref_path)
                    .ok_or_else(|| PlanError::unresolved(ref_path.as_str(), location))?;
                let mut node = SchemaNode::reference(name);
                node.meta.description = description.clone();
                let ext = Extensions::new(extensions);
                node.meta.nullable = ext.boolean(EXT_NULLABLE).unwrap_or(false);
                Ok(node)
            }
            SchemaOrRef::Schema(schema) => Self::from_schema(schema, location),
        }
    }

    pub fn from_schema(schema: &Schema, location: &str) -> Result<Self, PlanError> {
        let meta = meta_of(schema);

        if !schema.one_of.is_empty() || !schema.any_of.is_empty() {
            let (mode, members) = if schema.one_of.is_empty() {
                (CompositeMode::AnyOf, &schema.any_of)
            } else {
                (CompositeMode::OneOf, &schema.one_of)
            };
            return union_node(mode, members, schema, meta, location);
        }

        if !schema.all_of.is_empty() {
            return all_of_node(schema, meta, location);
        }

        if !schema.enum_values.is_empty() || schema.const_value.is_some() {
            let values = if schema.enum_values.is_empty() {
                schema.const_value.iter().cloned().collect()
            } else {
                schema.enum_values.clone()
            };
            // `null` among the literals means the enum is nullable, not a variant.
            let nullable = values.iter().any(serde_json::Value::is_null);
            let values: Vec<_> = values.into_iter().filter(|v| !v.is_null()).collect();
            let base = match declared_scalar(schema) {
                Some(kind) => kind,
                None => infer_enum_base(&values),
            };
            let mut node = SchemaNode {
                kind: NodeKind::Enum { base, values },
                meta,
            };
            node.meta.nullable |= nullable;
            return Ok(node);
        }

        let non_null = schema
            .schema_type
            .as_ref()
            .map(TypeSet::non_null)
            .unwrap_or_default();

        let kind = match non_null.as_slice() {
            [] if schema.schema_type.is_some() => {
                // `type: null` alone.
                NodeKind::Scalar(ScalarKind::Any)
            }
            [] => {
                if !schema.properties.is_empty() || schema.additional_properties.is_some() {
                    object_kind(schema, location)?
                } else if schema.items.is_some() {
                    array_kind(schema, location)?
                } else {
                    NodeKind::Scalar(ScalarKind::Any)
                }
            }
            [SchemaType::Object] => object_kind(schema, location)?,
            [SchemaType::Array] => array_kind(schema, location)?,
            [SchemaType::String] => NodeKind::Scalar(ScalarKind::String),
            [SchemaType::Integer] => NodeKind::Scalar(ScalarKind::Integer),
            [SchemaType::Number] => NodeKind::Scalar(ScalarKind::Number),
            [SchemaType::Boolean] => NodeKind::Scalar(ScalarKind::Boolean),
            _ => {
                log::warn!("{location}: multiple types {non_null:?}, mapping as untyped");
                NodeKind::Scalar(ScalarKind::Any)
            }
        };

        Ok(SchemaNode { kind, meta })
    }

    /// Canonical names of every reference reachable inside this node.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match &self.kind {
            NodeKind::Reference { name } => out.push(name),
            NodeKind::Scalar(_) | NodeKind::Enum { .. } => {}
            NodeKind::Object {
                properties,
                additional,
            } => {
                for p in properties {
                    p.node.collect_references(out);
                }
                if let Some(additional) = additional {
                    additional.collect_references(out);
                }
            }
            NodeKind::Array { items } => items.collect_references(out),
            NodeKind::Map { key, value } => {
                key.collect_references(out);
                value.collect_references(out);
            }
            NodeKind::Composite { parts, .. } => {
                for part in parts {
                    part.collect_references(out);
                }
            }
        }
    }

    /// Whether this node plans into its own model file when registered.
    pub fn is_model_kind(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Object { .. } | NodeKind::Enum { .. } | NodeKind::Composite { .. }
        )
    }
}

/// Canonical name of a same-document component schema reference.
pub fn component_name(ref_path: &str) -> Option<String> {
    let raw = ref_path.strip_prefix(COMPONENT_SCHEMA_PREFIX)?;
    if raw.is_empty() || raw.contains('/') {
        return None;
    }
    Some(raw.replace("~1", "/").replace("~0", "~"))
}

fn meta_of(schema: &Schema) -> NodeMeta {
    let ext = schema.ext();
    NodeMeta {
        format: schema.format.clone(),
        pattern: schema.pattern.clone(),
        minimum: bound(schema.minimum, schema.exclusive_minimum),
        maximum: bound(schema.maximum, schema.exclusive_maximum),
        min_length: schema.min_length,
        max_length: schema.max_length,
        min_items: schema.min_items,
        max_items: schema.max_items,
        unique_items: schema.unique_items.unwrap_or(false),
        nullable: schema.nullable.unwrap_or(false)
            || schema.schema_type.as_ref().is_some_and(TypeSet::includes_null)
            || ext.boolean(EXT_NULLABLE).unwrap_or(false),
        deprecated: schema.deprecated.unwrap_or(false),
        deprecation_message: ext.string(EXT_DEPRECATION_MESSAGE).map(str::to_string),
        description: schema.description.clone(),
        default_value: schema.default_value.clone(),
        read_only: schema.read_only.unwrap_or(false),
        write_only: schema.write_only.unwrap_or(false),
        json_serializer: ext.string(EXT_JSON_SERIALIZER).map(str::to_string),
        validation_constraint: ext.string(EXT_VALIDATION_CONSTRAINT).map(str::to_string),
        model_subdir: ext.string(EXT_MODEL_SUBDIR).map(str::to_string),
    }
}

fn bound(inclusive: Option<f64>, exclusive: Option<ExclusiveBound>) -> Option<Bound> {
    match (inclusive, exclusive) {
        (_, Some(ExclusiveBound::Value(value))) => Some(Bound {
            value,
            exclusive: true,
        }),
        (Some(value), flag) => Some(Bound {
            value,
            exclusive: matches!(flag, Some(ExclusiveBound::Flag(true))),
        }),
        (None, _) => None,
    }
}

fn declared_scalar(schema: &Schema) -> Option<ScalarKind> {
    let types = schema.schema_type.as_ref()?.non_null();
    match types.as_slice() {
        [SchemaType::String] => Some(ScalarKind::String),
        [SchemaType::Integer] => Some(ScalarKind::Integer),
        [SchemaType::Number] => Some(ScalarKind::Number),
        [SchemaType::Boolean] => Some(ScalarKind::Boolean),
        _ => None,
    }
}

fn infer_enum_base(values: &[serde_json::Value]) -> ScalarKind {
    if values.iter().all(serde_json::Value::is_string) {
        ScalarKind::String
    } else if values.iter().all(|v| v.is_i64() || v.is_u64()) {
        ScalarKind::Integer
    } else if values.iter().all(serde_json::Value::is_number) {
        ScalarKind::Number
    } else if values.iter().all(serde_json::Value::is_boolean) {
        ScalarKind::Boolean
    } else {
        ScalarKind::Any
    }
}

fn object_kind(schema: &Schema, location: &str) -> Result<NodeKind, PlanError> {
    let additional = match &schema.additional_properties {
        Some(AdditionalProperties::Schema(value)) => Some(SchemaNode::from_schema_or_ref(
            value,
            &format!("{location}.additionalProperties"),
        )?),
        Some(AdditionalProperties::Bool(true)) => Some(SchemaNode::scalar(ScalarKind::Any)),
        Some(AdditionalProperties::Bool(false)) | None => None,
    };

    if schema.properties.is_empty() {
        if let Some(value) = additional {
            let key = match &schema.property_names {
                Some(names) => SchemaNode::from_schema_or_ref(
                    names,
                    &format!("{location}.propertyNames"),
                )?,
                None => SchemaNode::scalar(ScalarKind::String),
            };
            return Ok(NodeKind::Map {
                key: Box::new(key),
                value: Box::new(value),
            });
        }
    }

    let properties = schema
        .properties
        .iter()
        .map(|(name, prop)| {
            Ok(Property {
                name: name.clone(),
                node: SchemaNode::from_schema_or_ref(prop, &format!("{location}.{name}"))?,
                required: schema.required.contains(name),
            })
        })
        .collect::<Result<Vec<_>, PlanError>>()?;

    Ok(NodeKind::Object {
        properties,
        additional: additional.map(Box::new),
    })
}

fn array_kind(schema: &Schema, location: &str) -> Result<NodeKind, PlanError> {
    let items = match &schema.items {
        Some(items) => SchemaNode::from_schema_or_ref(items, &format!("{location}[]"))?,
        None => SchemaNode::scalar(ScalarKind::Any),
    };
    Ok(NodeKind::Array {
        items: Box::new(items),
    })
}

fn is_null_schema(schema: &SchemaOrRef) -> bool {
    match schema {
        SchemaOrRef::Schema(s) => s
            .schema_type
            .as_ref()
            .is_some_and(|t| t.includes_null() && t.non_null().is_empty()),
        SchemaOrRef::Ref { .. } => false,
    }
}

/// `oneOf`/`anyOf`; a single non-null member collapses to that member.
fn union_node(
    mode: CompositeMode,
    members: &[SchemaOrRef],
    schema: &Schema,
    meta: NodeMeta,
    location: &str,
) -> Result<SchemaNode, PlanError> {
    let has_null = members.iter().any(is_null_schema);
    let parts = members
        .iter()
        .filter(|m| !is_null_schema(m))
        .enumerate()
        .map(|(i, m)| SchemaNode::from_schema_or_ref(m, &format!("{location}<{}>", i + 1)))
        .collect::<Result<Vec<_>, PlanError>>()?;

    if let [only] = parts.as_slice() {
        let mut node = merge_outer(only.clone(), meta);
        node.meta.nullable |= has_null;
        return Ok(node);
    }
    if parts.is_empty() {
        let mut node = SchemaNode {
            kind: NodeKind::Scalar(ScalarKind::Any),
            meta,
        };
        node.meta.nullable = true;
        return Ok(node);
    }

    let mut node = SchemaNode {
        kind: NodeKind::Composite {
            mode,
            parts,
            discriminator: schema.discriminator.clone(),
        },
        meta,
    };
    node.meta.nullable |= has_null;
    Ok(node)
}

/// `allOf`; own properties next to `allOf` become a trailing object part.
fn all_of_node(schema: &Schema, meta: NodeMeta, location: &str) -> Result<SchemaNode, PlanError> {
    let mut parts = schema
        .all_of
        .iter()
        .enumerate()
        .map(|(i, m)| SchemaNode::from_schema_or_ref(m, &format!("{location}<{}>", i + 1)))
        .collect::<Result<Vec<_>, PlanError>>()?;

    if !schema.properties.is_empty() {
        parts.push(SchemaNode::new(object_kind(schema, location)?));
    }

    if parts.len() == 1 {
        let only = parts.remove(0);
        return Ok(merge_outer(only, meta));
    }

    Ok(SchemaNode {
        kind: NodeKind::Composite {
            mode: CompositeMode::AllOf,
            parts,
            discriminator: schema.discriminator.clone(),
        },
        meta,
    })
}

/// Fold a wrapper's keywords into the node it collapses to; the wrapper wins
/// where it says something.
fn merge_outer(mut inner: SchemaNode, outer: NodeMeta) -> SchemaNode {
    let m = &mut inner.meta;
    m.nullable |= outer.nullable;
    m.deprecated |= outer.deprecated;
    m.read_only |= outer.read_only;
    m.write_only |= outer.write_only;
    m.unique_items |= outer.unique_items;
    macro_rules! prefer_outer {
        ($($field:ident),*) => {
            $(if outer.$field.is_some() { m.$field = outer.$field; })*
        };
    }
    prefer_outer!(
        format,
        pattern,
        minimum,
        maximum,
        min_length,
        max_length,
        min_items,
        max_items,
        deprecation_message,
        description,
        default_value,
        json_serializer,
        validation_constraint,
        model_subdir
    );
    inner
}
