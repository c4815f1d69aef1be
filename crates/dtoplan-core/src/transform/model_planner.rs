use std::collections::{BTreeSet, HashSet};

use rayon::prelude::*;

use crate::config::{EmptySchemaPolicy, PlanConfig};
use crate::error::PlanError;
use crate::ir::{Deprecation, FieldPlan, MappedType, ModelBody, ModelFilePlan, TypeExpr};

use super::name_normalizer::{claim_identifier, normalize_name};
use super::registry::TypeRegistry;
use super::schema_node::{CompositeMode, NodeKind, NodeMeta, SchemaNode};
use super::type_mapper::{MapContext, MergedProperty, TypeMapper};

pub const MODEL_MODULE: &str = "model";

/// One plan per named object, enum and composite schema, in registry order.
/// Schemas replaced through `type_overrides` get no file.
pub fn plan_models(registry: &TypeRegistry, config: &PlanConfig) -> Result<Vec<ModelFilePlan>, PlanError> {
    let mapper = TypeMapper::new(registry, config);
    let candidates: Vec<(&String, &SchemaNode)> = registry
        .iter()
        .filter(|(name, node)| node.is_model_kind() && !config.type_overrides.contains_key(*name))
        .collect();

    let results: Vec<Result<ModelFilePlan, PlanError>> = if config.parallel {
        candidates
            .par_iter()
            .map(|(name, node)| plan_model(&mapper, name, node))
            .collect()
    } else {
        candidates
            .iter()
            .map(|(name, node)| plan_model(&mapper, name, node))
            .collect()
    };

    results.into_iter().collect()
}

/// Plan a single named schema.
pub fn plan_model(mapper: &TypeMapper<'_>, name: &str, node: &SchemaNode) -> Result<ModelFilePlan, PlanError> {
    let config = mapper.config();
    let mut supertypes = Vec::new();

    let body = match &node.kind {
        NodeKind::Object {
            properties,
            additional,
        } => {
            let merged: Vec<MergedProperty<'_>> = properties
                .iter()
                .map(|p| MergedProperty {
                    name: p.name.clone(),
                    node: &p.node,
                    required: p.required,
                })
                .collect();
            check_empty(name, &merged, config.empty_schema)?;
            let additional_properties = additional
                .as_ref()
                .map(|a| {
                    mapper.map(
                        a,
                        MapContext::required().element(),
                        &format!("{name}.additionalProperties"),
                    )
                })
                .transpose()?;
            ModelBody::Record {
                fields: plan_fields(mapper, name, &merged)?,
                additional_properties,
            }
        }
        NodeKind::Composite {
            mode: CompositeMode::AllOf,
            parts,
            ..
        } => {
            let (merged, parents) = mapper.merge_all_of(parts, name)?;
            check_empty(name, &merged, config.empty_schema)?;
            supertypes = parents;
            ModelBody::Record {
                fields: plan_fields(mapper, name, &merged)?,
                additional_properties: None,
            }
        }
        NodeKind::Enum { .. } | NodeKind::Composite { .. } => {
            match mapper.map(node, MapContext::required(), name)?.expr {
                TypeExpr::Enumeration { base, variants } => ModelBody::Enumeration { base, variants },
                TypeExpr::Union {
                    variants,
                    discriminator,
                } => ModelBody::Union {
                    variants,
                    discriminator,
                },
                other => {
                    return Err(PlanError::unsupported(
                        name,
                        format!("expected enum or union, mapped to {}", other.describe()),
                    ));
                }
            }
        }
        NodeKind::Scalar(_) | NodeKind::Array { .. } | NodeKind::Map { .. } | NodeKind::Reference { .. } => {
            return Err(PlanError::unsupported(name, "schema kind has no model file"));
        }
    };

    let mut references = BTreeSet::new();
    let mut external_imports = BTreeSet::new();
    let mut absorb = |m: &MappedType| {
        references.extend(m.references.iter().cloned());
        external_imports.extend(m.external_imports.iter().cloned());
    };
    match &body {
        ModelBody::Record {
            fields,
            additional_properties,
        } => {
            fields.iter().for_each(|f| absorb(&f.mapped));
            additional_properties.iter().for_each(&mut absorb);
        }
        ModelBody::Union { variants, .. } => variants.iter().for_each(&mut absorb),
        ModelBody::Enumeration { .. } => {}
    }
    for parent in &supertypes {
        match config.type_overrides.get(parent) {
            Some(over) => external_imports.extend(over.import.iter().cloned()),
            None => {
                references.insert(parent.clone());
            }
        }
    }
    references.remove(name);

    let plan = ModelFilePlan {
        name: mapper.type_name(name),
        schema_name: name.to_string(),
        module_path: module_path(&node.meta),
        description: node.meta.description.clone(),
        deprecated: deprecation(&node.meta),
        body,
        supertypes: supertypes.iter().map(|s| mapper.type_name(s)).collect(),
        requires_indirection: mapper.registry().requires_indirection(name),
        references,
        external_imports,
    };
    log::debug!(
        "planned model {} ({} fields, {} references)",
        plan.name,
        plan.fields().len(),
        plan.references.len()
    );
    Ok(plan)
}

fn plan_fields(
    mapper: &TypeMapper<'_>,
    owner: &str,
    properties: &[MergedProperty<'_>],
) -> Result<Vec<FieldPlan>, PlanError> {
    let mut taken = HashSet::new();
    properties
        .iter()
        .map(|p| plan_field(mapper, owner, p, &mut taken))
        .collect()
}

fn plan_field(
    mapper: &TypeMapper<'_>,
    owner: &str,
    prop: &MergedProperty<'_>,
    taken: &mut HashSet<String>,
) -> Result<FieldPlan, PlanError> {
    let mapped = mapper.map(
        prop.node,
        MapContext::with_required(prop.required),
        &format!("{owner}.{}", prop.name),
    )?;
    let name = normalize_name(&prop.name);
    let meta = &prop.node.meta;
    Ok(FieldPlan {
        ident: claim_identifier(mapper.config().field_ident(&name), taken),
        name,
        wire_name: prop.name.clone(),
        requires_indirection: matches!(mapped.expr, TypeExpr::Named { .. }) && mapped.requires_indirection,
        mapped,
        required: prop.required,
        default_value: meta.default_value.clone(),
        description: meta.description.clone(),
        deprecated: deprecation(meta),
        read_only: meta.read_only,
        write_only: meta.write_only,
    })
}

fn check_empty(name: &str, properties: &[MergedProperty<'_>], policy: EmptySchemaPolicy) -> Result<(), PlanError> {
    if !properties.is_empty() {
        return Ok(());
    }
    match policy {
        EmptySchemaPolicy::Allow => Ok(()),
        EmptySchemaPolicy::Warn => {
            log::warn!("schema '{name}' declares no properties, planning an empty record");
            Ok(())
        }
        EmptySchemaPolicy::Error => Err(PlanError::EmptySchema {
            schema: name.to_string(),
        }),
    }
}

/// `model` or `model/<x-model-subdir>`.
pub fn module_path(meta: &NodeMeta) -> String {
    match meta.model_subdir.as_deref().map(|d| d.trim_matches('/')) {
        Some(dir) if !dir.is_empty() => format!("{MODEL_MODULE}/{dir}"),
        _ => MODEL_MODULE.to_string(),
    }
}

pub(crate) fn deprecation(meta: &NodeMeta) -> Option<Deprecation> {
    meta.deprecated.then(|| Deprecation {
        message: meta.deprecation_message.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Annotation, NamedKind, Primitive};
    use crate::parse::schema::SchemaOrRef;

    fn registry(components: &[(&str, &str)]) -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        for (name, yaml) in components {
            let schema: SchemaOrRef = serde_yaml_ng::from_str(yaml).unwrap();
            registry
                .register(*name, SchemaNode::from_schema_or_ref(&schema, name).unwrap())
                .unwrap();
        }
        registry.validate_references().unwrap();
        registry.detect_cycles();
        registry
    }

    const ORDER: &str = r#"
type: object
required: [id, status, createdTime, items]
properties:
  id: { type: string, format: uuid }
  placedBy: { type: string }
  status: { $ref: '#/components/schemas/OrderStatus' }
  createdTime: { type: string, format: date-time }
  items:
    type: array
    items: { $ref: '#/components/schemas/OrderItem' }
  comment: { type: string, maxLength: 500 }
"#;

    fn order_registry() -> TypeRegistry {
        registry(&[
            ("Order", ORDER),
            ("OrderStatus", "{type: string, enum: [Created, Processing, Dispatched]}"),
            ("OrderItem", "type: object\nproperties: { sku: { type: string } }"),
        ])
    }

    #[test]
    fn test_field_order_and_optionality() {
        let registry = order_registry();
        let config = PlanConfig::default();
        let models = plan_models(&registry, &config).unwrap();
        let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["Order", "OrderStatus", "OrderItem"]);

        let order = &models[0];
        let fields: Vec<_> = order.fields().iter().map(|f| f.wire_name.as_str()).collect();
        assert_eq!(fields, ["id", "placedBy", "status", "createdTime", "items", "comment"]);

        let comment = order.field("comment").unwrap();
        assert!(comment.mapped.optional);
        assert!(comment.default_value.is_none());
        assert_eq!(comment.mapped.annotations, vec![Annotation::MaxLength { value: 500 }]);

        let status = order.field("status").unwrap();
        assert!(!status.mapped.optional);
        assert_eq!(status.mapped.annotations, vec![Annotation::NotNull]);
        assert!(matches!(
            status.mapped.expr,
            TypeExpr::Named {
                named_kind: NamedKind::Enumeration,
                ..
            }
        ));

        assert_eq!(
            order.references.iter().map(String::as_str).collect::<Vec<_>>(),
            ["OrderItem", "OrderStatus"]
        );
    }

    #[test]
    fn test_enum_model() {
        let registry = order_registry();
        let models = plan_models(&registry, &PlanConfig::default()).unwrap();
        let status = &models[1];
        assert_eq!(
            status.enum_wire_values().unwrap(),
            [&serde_json::json!("Created"), &serde_json::json!("Processing"), &serde_json::json!("Dispatched")]
        );
        assert!(matches!(
            status.body,
            ModelBody::Enumeration {
                base: Primitive::String,
                ..
            }
        ));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let registry = order_registry();
        let parallel = plan_models(&registry, &PlanConfig::default()).unwrap();
        let sequential = plan_models(
            &registry,
            &PlanConfig {
                parallel: false,
                ..PlanConfig::default()
            },
        )
        .unwrap();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_self_reference() {
        let registry = registry(&[(
            "Node",
            r#"
type: object
properties:
  value: { type: string }
  parent: { $ref: '#/components/schemas/Node' }
  children: { type: array, items: { $ref: '#/components/schemas/Node' } }
"#,
        )]);
        let models = plan_models(&registry, &PlanConfig::default()).unwrap();
        let node = &models[0];
        assert!(node.requires_indirection);
        assert!(node.references.is_empty());
        assert!(node.field("parent").unwrap().requires_indirection);

        let children = node.field("children").unwrap();
        assert!(!children.requires_indirection);
        assert!(!children.mapped.requires_indirection);
        let TypeExpr::List { item, .. } = &children.mapped.expr else {
            panic!("expected list");
        };
        assert!(item.requires_indirection);
    }

    #[test]
    fn test_empty_schema_policy() {
        let registry = registry(&[("Marker", "type: object")]);
        let allowed = plan_models(&registry, &PlanConfig::default()).unwrap();
        assert!(allowed[0].fields().is_empty());

        let config = PlanConfig {
            empty_schema: EmptySchemaPolicy::Error,
            ..PlanConfig::default()
        };
        assert_eq!(
            plan_models(&registry, &config).unwrap_err(),
            PlanError::EmptySchema {
                schema: "Marker".into()
            }
        );
    }

    #[test]
    fn test_all_of_supertypes_and_subdir() {
        let registry = registry(&[
            ("Base", "type: object\nproperties: { id: { type: string } }"),
            (
                "Derived",
                r#"
x-model-subdir: common
allOf:
  - $ref: '#/components/schemas/Base'
  - type: object
    properties:
      extra: { type: integer }
"#,
            ),
        ]);
        let config = PlanConfig {
            model_suffix: "Dto".into(),
            ..PlanConfig::default()
        };
        let models = plan_models(&registry, &config).unwrap();
        let derived = &models[1];
        assert_eq!(derived.name, "DerivedDto");
        assert_eq!(derived.module_path, "model/common");
        assert_eq!(derived.supertypes, ["BaseDto"]);
        assert!(derived.references.contains("Base"));
        let fields: Vec<_> = derived.fields().iter().map(|f| f.ident.as_str()).collect();
        assert_eq!(fields, ["id", "extra"]);
    }

    #[test]
    fn test_colliding_field_idents() {
        let registry = registry(&[(
            "Widget",
            "type: object\nproperties: { foo-bar: { type: string }, foo_bar: { type: integer }, fooBar: { type: boolean } }",
        )]);
        let models = plan_models(&registry, &PlanConfig::default()).unwrap();
        let fields: Vec<_> = models[0]
            .fields()
            .iter()
            .map(|f| (f.wire_name.as_str(), f.ident.as_str()))
            .collect();
        assert_eq!(
            fields,
            [("foo-bar", "fooBar"), ("foo_bar", "fooBar_2"), ("fooBar", "fooBar_3")]
        );
    }

    #[test]
    fn test_first_error_in_registry_order() {
        let registry = registry(&[
            ("A", "type: object\nproperties: { m: { type: object, propertyNames: { type: integer }, additionalProperties: true } }"),
            ("B", "type: object"),
        ]);
        let config = PlanConfig {
            empty_schema: EmptySchemaPolicy::Error,
            promote_inline: false,
            ..PlanConfig::default()
        };
        assert!(matches!(
            plan_models(&registry, &config).unwrap_err(),
            PlanError::UnsupportedKeyType { .. }
        ));
    }

    #[test]
    fn test_deprecation() {
        let registry = registry(&[(
            "Legacy",
            "type: object\ndeprecated: true\nx-deprecation-message: use Modern\nproperties: { a: { type: string, deprecated: true } }",
        )]);
        let models = plan_models(&registry, &PlanConfig::default()).unwrap();
        assert_eq!(
            models[0].deprecated,
            Some(Deprecation {
                message: Some("use Modern".into())
            })
        );
        assert_eq!(models[0].field("a").unwrap().deprecated, Some(Deprecation { message: None }));
    }
}
