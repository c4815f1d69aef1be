use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// A name with multiple casing variants pre-computed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NormalizedName {
    pub original: String,
    /// `original` with separators collapsed to `_` and a leading digit escaped.
    pub sanitized: String,
    pub pascal_case: String,
    pub camel_case: String,
    pub snake_case: String,
    pub screaming_snake: String,
}

impl fmt::Display for NormalizedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Target-language scalar, independent of any particular language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    String,
    Uuid,
    Uri,
    Timestamp,
    Date,
    Duration,
    Bytes,
    Int,
    Long,
    Float,
    Double,
    Decimal,
    Bool,
    /// Untyped value.
    Any,
}

impl Primitive {
    /// Wire pattern for temporal types.
    pub fn serialization_pattern(self) -> Option<&'static str> {
        match self {
            Primitive::Timestamp => Some("yyyy-MM-dd'T'HH:mm:ss"),
            Primitive::Date => Some("yyyy-MM-dd"),
            _ => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Primitive::Int | Primitive::Long | Primitive::Float | Primitive::Double | Primitive::Decimal
        )
    }
}

/// What kind of file a named type is planned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NamedKind {
    Model,
    Enumeration,
    Union,
}

/// Semantic description of a target type expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeExpr {
    Primitive {
        primitive: Primitive,
    },
    /// Ordered container; `unique` asks for set semantics.
    List {
        item: Box<MappedType>,
        unique: bool,
    },
    Map {
        key: Box<MappedType>,
        value: Box<MappedType>,
    },
    /// A type planned into its own file.
    Named {
        /// Target type name.
        name: String,
        /// Canonical schema name in the registry.
        schema: String,
        named_kind: NamedKind,
    },
    /// A caller-supplied type replacing a schema.
    External {
        type_name: String,
        import: Option<String>,
    },
    Enumeration {
        base: Primitive,
        variants: Vec<EnumVariant>,
    },
    /// Anonymous object, or the merge of an `allOf`.
    Record {
        fields: Vec<InlineField>,
    },
    /// Tagged union of `oneOf`/`anyOf` members.
    Union {
        variants: Vec<MappedType>,
        discriminator: Option<DiscriminatorPlan>,
    },
}

impl TypeExpr {
    pub fn primitive(primitive: Primitive) -> Self {
        TypeExpr::Primitive { primitive }
    }

    pub fn is_named_model(&self) -> bool {
        matches!(
            self,
            TypeExpr::Named {
                named_kind: NamedKind::Model | NamedKind::Union,
                ..
            }
        )
    }

    /// Short human-readable form used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TypeExpr::Primitive { primitive } => format!("{primitive:?}").to_lowercase(),
            TypeExpr::List { item, unique } => {
                let container = if *unique { "set" } else { "list" };
                format!("{container}<{}>", item.expr.describe())
            }
            TypeExpr::Map { key, value } => {
                format!("map<{}, {}>", key.expr.describe(), value.expr.describe())
            }
            TypeExpr::Named { name, .. } => name.clone(),
            TypeExpr::External { type_name, .. } => type_name.clone(),
            TypeExpr::Enumeration { .. } => "enum".to_string(),
            TypeExpr::Record { .. } => "record".to_string(),
            TypeExpr::Union { variants, .. } => variants
                .iter()
                .map(|v| v.expr.describe())
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }
}

/// One enumeration constant: target identifier plus the literal it encodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumVariant {
    pub name: String,
    pub value: serde_json::Value,
}

/// A field of an anonymous record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineField {
    pub wire_name: String,
    pub ident: String,
    pub mapped: MappedType,
    pub required: bool,
}

/// Discriminator of a tagged union: wire value → target type name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscriminatorPlan {
    pub property: String,
    pub mapping: Vec<(String, String)>,
}

/// Validation, serialization and documentation metadata for a mapped type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Annotation {
    NotNull,
    NotBlank,
    NotEmpty,
    /// Cascade validation into the referenced value.
    Valid,
    Email,
    Pattern { regex: String },
    MinLength { value: u64 },
    MaxLength { value: u64 },
    Minimum { value: f64, exclusive: bool },
    Maximum { value: f64, exclusive: bool },
    MinItems { value: u64 },
    MaxItems { value: u64 },
    DateFormat { pattern: String },
    JsonSerializer { class: String },
    /// Custom validation constraint class.
    Constraint { class: String },
    /// A `format` the mapper does not know, kept for documentation.
    Format { format: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationCategory {
    Validation,
    Serialization,
    Documentation,
}

impl Annotation {
    pub fn category(&self) -> AnnotationCategory {
        match self {
            Annotation::DateFormat { .. } | Annotation::JsonSerializer { .. } => {
                AnnotationCategory::Serialization
            }
            Annotation::Format { .. } => AnnotationCategory::Documentation,
            _ => AnnotationCategory::Validation,
        }
    }
}

/// Output of the type mapper for one schema node in one context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedType {
    pub expr: TypeExpr,
    /// No value is required at construction; absence decodes to "no value".
    pub optional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    /// Canonical names of registry schemas this type mentions.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub references: BTreeSet<String>,
    /// Fully qualified names supplied by overrides and extensions.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub external_imports: BTreeSet<String>,
    pub requires_indirection: bool,
}

impl MappedType {
    pub fn new(expr: TypeExpr) -> Self {
        Self {
            expr,
            optional: false,
            format: None,
            annotations: Vec::new(),
            references: BTreeSet::new(),
            external_imports: BTreeSet::new(),
            requires_indirection: false,
        }
    }

    /// Append a descriptor unless an equal one is already present.
    pub fn annotate(&mut self, annotation: Annotation) {
        if !self.annotations.contains(&annotation) {
            self.annotations.push(annotation);
        }
    }

    /// Fold a nested type's dependencies into this one.
    pub fn absorb_dependencies(&mut self, inner: &MappedType) {
        self.references.extend(inner.references.iter().cloned());
        self.external_imports
            .extend(inner.external_imports.iter().cloned());
    }

    pub fn has_annotation(&self, predicate: impl Fn(&Annotation) -> bool) -> bool {
        self.annotations.iter().any(predicate)
    }

    /// Wire literals of an enumeration type, in declared order.
    pub fn enum_wire_values(&self) -> Option<Vec<&serde_json::Value>> {
        match &self.expr {
            TypeExpr::Enumeration { variants, .. } => {
                Some(variants.iter().map(|v| &v.value).collect())
            }
            _ => None,
        }
    }
}
