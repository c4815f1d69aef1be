use std::collections::HashSet;

use indexmap::IndexMap;

use crate::config::PlanConfig;
use crate::error::PlanError;
use crate::ir::{
    Annotation, DiscriminatorPlan, EnumVariant, InlineField, MappedType, NamedKind, Primitive,
    TypeExpr,
};
use crate::parse::schema::{Discriminator, SchemaOrRef};

use super::name_normalizer::{claim_identifier, enum_variant_name, normalize_name};
use super::registry::TypeRegistry;
use super::schema_node::{CompositeMode, NodeKind, NodeMeta, ScalarKind, SchemaNode, component_name};

/// One row of the scalar table: `(type, format)` → target primitive.
struct ScalarRule {
    kind: ScalarKind,
    format: Option<&'static str>,
    primitive: Primitive,
    email: bool,
}

const fn rule(kind: ScalarKind, format: Option<&'static str>, primitive: Primitive) -> ScalarRule {
    ScalarRule {
        kind,
        format,
        primitive,
        email: false,
    }
}

/// Known `(type, format)` pairs. A pair not listed here falls back to the
/// row for `(type, none)` and keeps its format as documentation.
const SCALAR_TABLE: &[ScalarRule] = &[
    rule(ScalarKind::String, None, Primitive::String),
    rule(ScalarKind::String, Some("uuid"), Primitive::Uuid),
    rule(ScalarKind::String, Some("date-time"), Primitive::Timestamp),
    rule(ScalarKind::String, Some("date"), Primitive::Date),
    ScalarRule {
        kind: ScalarKind::String,
        format: Some("email"),
        primitive: Primitive::String,
        email: true,
    },
    rule(ScalarKind::String, Some("binary"), Primitive::Bytes),
    rule(ScalarKind::String, Some("byte"), Primitive::Bytes),
    rule(ScalarKind::String, Some("uri"), Primitive::Uri),
    rule(ScalarKind::String, Some("duration"), Primitive::Duration),
    rule(ScalarKind::Integer, None, Primitive::Int),
    rule(ScalarKind::Integer, Some("int32"), Primitive::Int),
    rule(ScalarKind::Integer, Some("int64"), Primitive::Long),
    rule(ScalarKind::Number, None, Primitive::Decimal),
    rule(ScalarKind::Number, Some("float"), Primitive::Float),
    rule(ScalarKind::Number, Some("double"), Primitive::Double),
    rule(ScalarKind::Boolean, None, Primitive::Bool),
    rule(ScalarKind::Any, None, Primitive::Any),
];

/// Look up a scalar rule. The second value is `true` when `format` was not
/// recognised and the base row was used instead.
fn scalar_rule(kind: ScalarKind, format: Option<&str>) -> (&'static ScalarRule, bool) {
    let exact = SCALAR_TABLE
        .iter()
        .find(|r| r.kind == kind && r.format == format);
    match exact {
        Some(rule) => (rule, false),
        None => {
            let base = SCALAR_TABLE
                .iter()
                .find(|r| r.kind == kind && r.format.is_none())
                .unwrap_or(&SCALAR_TABLE[SCALAR_TABLE.len() - 1]);
            (base, format.is_some())
        }
    }
}

/// Where a node is being mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapContext {
    pub required: bool,
    /// Replaces the node's own nullability when set.
    pub nullable_override: Option<bool>,
    pub container_depth: usize,
}

impl MapContext {
    pub fn required() -> Self {
        Self {
            required: true,
            nullable_override: None,
            container_depth: 0,
        }
    }

    pub fn optional() -> Self {
        Self {
            required: false,
            ..Self::required()
        }
    }

    pub fn with_required(required: bool) -> Self {
        Self {
            required,
            ..Self::required()
        }
    }

    /// Context for a container element: always present and non-null.
    pub fn element(self) -> Self {
        Self {
            required: true,
            nullable_override: Some(false),
            container_depth: self.container_depth + 1,
        }
    }
}

/// A property of a merged `allOf`.
#[derive(Debug, Clone)]
pub struct MergedProperty<'n> {
    pub name: String,
    pub node: &'n SchemaNode,
    pub required: bool,
}

/// Maps schema nodes to target types. Holds no state besides its inputs, so
/// the same node in the same context always maps to an equal value.
#[derive(Debug, Clone, Copy)]
pub struct TypeMapper<'a> {
    registry: &'a TypeRegistry,
    config: &'a PlanConfig,
}

impl<'a> TypeMapper<'a> {
    pub fn new(registry: &'a TypeRegistry, config: &'a PlanConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &'a TypeRegistry {
        self.registry
    }

    pub fn config(&self) -> &'a PlanConfig {
        self.config
    }

    /// Map a schema node. `location` names the schema, property path or
    /// operation slot for diagnostics.
    pub fn map(
        &self,
        node: &SchemaNode,
        ctx: MapContext,
        location: &str,
    ) -> Result<MappedType, PlanError> {
        self.map_node(node, ctx, location, &mut Vec::new())
    }

    /// Map an operation-level schema straight from the parsed tree.
    pub fn map_schema(
        &self,
        schema: &SchemaOrRef,
        ctx: MapContext,
        location: &str,
    ) -> Result<MappedType, PlanError> {
        let node = SchemaNode::from_schema_or_ref(schema, location)?;
        self.map(&node, ctx, location)
    }

    /// Target type name of a registered schema.
    pub fn type_name(&self, schema: &str) -> String {
        match self.config.type_overrides.get(schema) {
            Some(o) => o.type_name.clone(),
            None => self.config.model_type_name(&normalize_name(schema)),
        }
    }

    fn map_node(
        &self,
        node: &SchemaNode,
        ctx: MapContext,
        location: &str,
        stack: &mut Vec<String>,
    ) -> Result<MappedType, PlanError> {
        let mut nullable = ctx.nullable_override.unwrap_or(node.meta.nullable);

        let mut mapped = match &node.kind {
            NodeKind::Scalar(kind) => self.map_scalar(*kind, &node.meta, location),
            NodeKind::Enum { base, values } => {
                let (rule, _) = scalar_rule(*base, node.meta.format.as_deref());
                MappedType::new(TypeExpr::Enumeration {
                    base: rule.primitive,
                    variants: self.enum_variants(values),
                })
            }
            NodeKind::Array { items } => {
                let item =
                    self.map_node(items, ctx.element(), &format!("{location}[]"), stack)?;
                let mut mapped = MappedType::new(TypeExpr::List {
                    item: Box::new(item.clone()),
                    unique: node.meta.unique_items,
                });
                mapped.absorb_dependencies(&item);
                mapped
            }
            NodeKind::Map { key, value } => {
                let key = self.map_key(key, ctx, location, stack)?;
                let value =
                    self.map_node(value, ctx.element(), &format!("{location}{{}}"), stack)?;
                let mut mapped = MappedType::new(TypeExpr::Map {
                    key: Box::new(key.clone()),
                    value: Box::new(value.clone()),
                });
                mapped.absorb_dependencies(&key);
                mapped.absorb_dependencies(&value);
                mapped
            }
            NodeKind::Reference { name } => {
                if let Some(over) = self.config.type_overrides.get(name) {
                    let mut mapped = MappedType::new(TypeExpr::External {
                        type_name: over.type_name.clone(),
                        import: over.import.clone(),
                    });
                    mapped.external_imports.extend(over.import.iter().cloned());
                    mapped
                } else {
                    let target = self
                        .registry
                        .get(name)
                        .ok_or_else(|| PlanError::unresolved(name.as_str(), location))?;
                    let target_nullable = node.meta.nullable || target.meta.nullable;
                    if !target.is_model_kind() {
                        // Scalars, containers and aliases have no file of their own.
                        if stack.contains(name) {
                            let mut names = stack.clone();
                            names.push(name.clone());
                            return Err(PlanError::CyclicReferenceUnsupported { names });
                        }
                        stack.push(name.clone());
                        let inner_ctx = MapContext {
                            nullable_override: Some(
                                ctx.nullable_override.unwrap_or(target_nullable),
                            ),
                            ..ctx
                        };
                        let result = self.map_node(target, inner_ctx, location, stack);
                        stack.pop();
                        return result;
                    }
                    nullable = ctx.nullable_override.unwrap_or(target_nullable);
                    let named_kind = match target.kind {
                        NodeKind::Enum { .. } => NamedKind::Enumeration,
                        NodeKind::Composite {
                            mode: CompositeMode::OneOf | CompositeMode::AnyOf,
                            ..
                        } => NamedKind::Union,
                        _ => NamedKind::Model,
                    };
                    let mut mapped = MappedType::new(TypeExpr::Named {
                        name: self.type_name(name),
                        schema: name.clone(),
                        named_kind,
                    });
                    mapped.references.insert(name.clone());
                    mapped.requires_indirection = self.registry.requires_indirection(name);
                    mapped
                }
            }
            NodeKind::Object { properties, .. } => {
                let merged: Vec<MergedProperty<'_>> = properties
                    .iter()
                    .map(|p| MergedProperty {
                        name: p.name.clone(),
                        node: &p.node,
                        required: p.required,
                    })
                    .collect();
                self.map_record(&merged, ctx, location, stack)?
            }
            NodeKind::Composite {
                mode: CompositeMode::AllOf,
                parts,
                ..
            } => {
                let (merged, _) = self.merge_all_of_with(parts, location, stack)?;
                self.map_record(&merged, ctx, location, stack)?
            }
            NodeKind::Composite {
                parts,
                discriminator,
                ..
            } => {
                let variants = parts
                    .iter()
                    .enumerate()
                    .map(|(i, part)| {
                        self.map_node(part, ctx.element(), &format!("{location}<{}>", i + 1), stack)
                    })
                    .collect::<Result<Vec<_>, PlanError>>()?;
                let discriminator = discriminator
                    .as_ref()
                    .map(|d| self.discriminator(d, &variants));
                let mut mapped = MappedType::new(TypeExpr::Union {
                    variants: variants.clone(),
                    discriminator,
                });
                for variant in &variants {
                    mapped.absorb_dependencies(variant);
                }
                mapped
            }
        };

        mapped.optional = !ctx.required || nullable;
        self.apply_annotations(&mut mapped, &node.meta, ctx.required && !nullable);
        Ok(mapped)
    }

    fn map_scalar(&self, kind: ScalarKind, meta: &NodeMeta, location: &str) -> MappedType {
        let format = meta.format.as_deref();
        let (rule, unrecognized) = scalar_rule(kind, format);
        let mut mapped = MappedType::new(TypeExpr::primitive(rule.primitive));
        mapped.format = meta.format.clone();

        if rule.email && self.config.validation_annotations {
            mapped.annotate(Annotation::Email);
        }
        if let Some(pattern) = rule.primitive.serialization_pattern() {
            mapped.annotate(Annotation::DateFormat {
                pattern: pattern.to_string(),
            });
        }
        if unrecognized {
            let format = format.unwrap_or_default();
            log::warn!("{location}: unrecognized format '{format}' for {kind:?}, using base type");
            mapped.annotate(Annotation::Format {
                format: format.to_string(),
            });
        }
        mapped
    }

    /// Map keys must be string-like; JSON object keys always are, so an
    /// untyped key schema is accepted as a string.
    fn map_key(
        &self,
        key: &SchemaNode,
        ctx: MapContext,
        location: &str,
        stack: &mut Vec<String>,
    ) -> Result<MappedType, PlanError> {
        let resolved = match &key.kind {
            NodeKind::Reference { name } if !self.config.type_overrides.contains_key(name) => {
                self.registry.resolve(name)?
            }
            _ => key,
        };
        let key_type = match &resolved.kind {
            NodeKind::Scalar(ScalarKind::String)
            | NodeKind::Enum {
                base: ScalarKind::String,
                ..
            } => None,
            NodeKind::Scalar(ScalarKind::Any) => {
                return Ok(MappedType::new(TypeExpr::primitive(Primitive::String)));
            }
            NodeKind::Reference { .. } => None,
            NodeKind::Scalar(other) | NodeKind::Enum { base: other, .. } => {
                Some(format!("{other:?}").to_lowercase())
            }
            NodeKind::Object { .. } => Some("object".to_string()),
            NodeKind::Array { .. } => Some("array".to_string()),
            NodeKind::Map { .. } => Some("map".to_string()),
            NodeKind::Composite { .. } => Some("composite".to_string()),
        };
        if let Some(key_type) = key_type {
            return Err(PlanError::UnsupportedKeyType {
                location: location.to_string(),
                key_type,
            });
        }
        let mut mapped = self.map_node(key, ctx.element(), &format!("{location}{{key}}"), stack)?;
        // Keys are never validated on their own.
        mapped
            .annotations
            .retain(|a| !matches!(a, Annotation::NotNull | Annotation::NotBlank));
        Ok(mapped)
    }

    fn map_record(
        &self,
        properties: &[MergedProperty<'_>],
        ctx: MapContext,
        location: &str,
        stack: &mut Vec<String>,
    ) -> Result<MappedType, PlanError> {
        let mut fields = Vec::with_capacity(properties.len());
        let mut taken = HashSet::new();
        let mut deps = MappedType::new(TypeExpr::Record { fields: Vec::new() });
        for prop in properties {
            let field_ctx = MapContext {
                container_depth: ctx.container_depth + 1,
                ..MapContext::with_required(prop.required)
            };
            let mapped =
                self.map_node(prop.node, field_ctx, &format!("{location}.{}", prop.name), stack)?;
            deps.absorb_dependencies(&mapped);
            fields.push(InlineField {
                wire_name: prop.name.clone(),
                ident: claim_identifier(
                    self.config.field_ident(&normalize_name(&prop.name)),
                    &mut taken,
                ),
                mapped,
                required: prop.required,
            });
        }
        deps.expr = TypeExpr::Record { fields };
        Ok(deps)
    }

    fn enum_variants(&self, values: &[serde_json::Value]) -> Vec<EnumVariant> {
        let mut taken = HashSet::new();
        values
            .iter()
            .map(|value| EnumVariant {
                name: claim_identifier(
                    enum_variant_name(value, self.config.naming.enum_variants),
                    &mut taken,
                ),
                value: value.clone(),
            })
            .collect()
    }

    fn discriminator(&self, d: &Discriminator, variants: &[MappedType]) -> DiscriminatorPlan {
        let mapping = if d.mapping.is_empty() {
            variants
                .iter()
                .filter_map(|v| match &v.expr {
                    TypeExpr::Named { name, schema, .. } => Some((schema.clone(), name.clone())),
                    _ => None,
                })
                .collect()
        } else {
            d.mapping
                .iter()
                .map(|(value, target)| {
                    let schema = component_name(target).unwrap_or_else(|| target.clone());
                    (value.clone(), self.type_name(&schema))
                })
                .collect()
        };
        DiscriminatorPlan {
            property: d.property_name.clone(),
            mapping,
        }
    }

    fn apply_annotations(&self, mapped: &mut MappedType, meta: &NodeMeta, present: bool) {
        let type_level = std::mem::take(&mut mapped.annotations);

        if self.config.validation_annotations {
            if present {
                mapped.annotate(match &mapped.expr {
                    TypeExpr::Primitive {
                        primitive: Primitive::String,
                    } => Annotation::NotBlank,
                    TypeExpr::Primitive {
                        primitive: Primitive::Bytes,
                    } => Annotation::NotEmpty,
                    _ => Annotation::NotNull,
                });
            }
            let cascades = mapped.expr.is_named_model()
                || matches!(
                    mapped.expr,
                    TypeExpr::List { .. }
                        | TypeExpr::Map { .. }
                        | TypeExpr::Record { .. }
                        | TypeExpr::Union { .. }
                );
            if cascades {
                mapped.annotate(Annotation::Valid);
            }
        }

        for annotation in type_level {
            mapped.annotate(annotation);
        }

        if self.config.validation_annotations {
            if let Some(regex) = &meta.pattern {
                mapped.annotate(Annotation::Pattern {
                    regex: regex.clone(),
                });
            }
            if let Some(value) = meta.min_length {
                mapped.annotate(Annotation::MinLength { value });
            }
            if let Some(value) = meta.max_length {
                mapped.annotate(Annotation::MaxLength { value });
            }
            if let Some(b) = meta.minimum {
                mapped.annotate(Annotation::Minimum {
                    value: b.value,
                    exclusive: b.exclusive,
                });
            }
            if let Some(b) = meta.maximum {
                mapped.annotate(Annotation::Maximum {
                    value: b.value,
                    exclusive: b.exclusive,
                });
            }
            if let Some(value) = meta.min_items {
                mapped.annotate(Annotation::MinItems { value });
            }
            if let Some(value) = meta.max_items {
                mapped.annotate(Annotation::MaxItems { value });
            }
            if let Some(class) = &meta.validation_constraint {
                mapped.annotate(Annotation::Constraint {
                    class: class.clone(),
                });
                mapped.external_imports.insert(class.clone());
            }
        }

        if let Some(class) = &meta.json_serializer {
            mapped.annotate(Annotation::JsonSerializer {
                class: class.clone(),
            });
            mapped.external_imports.insert(class.clone());
        }
    }

    /// Flatten the members of an `allOf` into one property list in
    /// declaration order. Returns the properties and the canonical names of
    /// referenced parents.
    pub fn merge_all_of<'n>(
        &'n self,
        parts: &'n [SchemaNode],
        location: &str,
    ) -> Result<(Vec<MergedProperty<'n>>, Vec<String>), PlanError> {
        self.merge_all_of_with(parts, location, &mut Vec::new())
    }

    fn merge_all_of_with<'n>(
        &'n self,
        parts: &'n [SchemaNode],
        location: &str,
        stack: &mut Vec<String>,
    ) -> Result<(Vec<MergedProperty<'n>>, Vec<String>), PlanError> {
        let mut collected: Vec<MergedProperty<'n>> = Vec::new();
        let mut supertypes = Vec::new();
        for part in parts {
            if let NodeKind::Reference { name } = &part.kind {
                supertypes.push(self.parent_schema(name, location)?);
            }
            self.collect_members(part, location, stack, &mut collected)?;
        }

        let mut merged: IndexMap<String, MergedProperty<'n>> = IndexMap::new();
        for prop in collected {
            match merged.get_mut(&prop.name) {
                None => {
                    merged.insert(prop.name.clone(), prop);
                }
                Some(existing) => {
                    let field_location = format!("{location}.{}", prop.name);
                    let a = self.map_node(existing.node, MapContext::required(), &field_location, stack)?;
                    let b = self.map_node(prop.node, MapContext::required(), &field_location, stack)?;
                    if a.expr != b.expr {
                        return Err(PlanError::DuplicateField {
                            schema: location.to_string(),
                            field: prop.name,
                        });
                    }
                    existing.required |= prop.required;
                }
            }
        }
        Ok((merged.into_values().collect(), supertypes))
    }

    /// Follow alias schemas from an `allOf` parent to the schema that names a
    /// type: one with a model file, or one replaced through `type_overrides`.
    fn parent_schema(&self, name: &str, location: &str) -> Result<String, PlanError> {
        let mut current = name.to_string();
        let mut seen = Vec::new();
        while !self.config.type_overrides.contains_key(&current) {
            let node = self
                .registry
                .get(&current)
                .ok_or_else(|| PlanError::unresolved(current.as_str(), location))?;
            let NodeKind::Reference { name: next } = &node.kind else {
                break;
            };
            seen.push(current);
            if seen.contains(next) {
                return Err(PlanError::CyclicReferenceUnsupported { names: seen });
            }
            current = next.clone();
        }
        Ok(current)
    }

    fn collect_members<'n>(
        &'n self,
        node: &'n SchemaNode,
        location: &str,
        stack: &mut Vec<String>,
        out: &mut Vec<MergedProperty<'n>>,
    ) -> Result<(), PlanError> {
        match &node.kind {
            NodeKind::Object { properties, .. } => {
                out.extend(properties.iter().map(|p| MergedProperty {
                    name: p.name.clone(),
                    node: &p.node,
                    required: p.required,
                }));
                Ok(())
            }
            NodeKind::Composite {
                mode: CompositeMode::AllOf,
                parts,
                ..
            } => {
                for part in parts {
                    self.collect_members(part, location, stack, out)?;
                }
                Ok(())
            }
            NodeKind::Reference { name } => {
                if stack.contains(name) {
                    let mut names = stack.clone();
                    names.push(name.clone());
                    return Err(PlanError::CyclicReferenceUnsupported { names });
                }
                let target = self
                    .registry
                    .get(name)
                    .ok_or_else(|| PlanError::unresolved(name.as_str(), location))?;
                stack.push(name.clone());
                let result = self.collect_members(target, location, stack, out);
                stack.pop();
                result
            }
            _ => Err(PlanError::unsupported(
                location,
                "allOf members must be objects or references to objects",
            )),
        }
    }
}
