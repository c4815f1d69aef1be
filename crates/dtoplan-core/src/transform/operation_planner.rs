use std::collections::{BTreeSet, HashSet};

use indexmap::IndexMap;
use rayon::prelude::*;

use crate::config::{GroupBy, NamingStrategy, PlanConfig};
use crate::error::PlanError;
use crate::ir::grouping::group_operations;
use crate::ir::{
    Deprecation, HeaderPlan, HttpMethod, InterfaceFilePlan, MappedType, MediaTypePlan,
    OperationPlan, ParameterLocation, ParameterPlan, RequestBodyPlan, ResponsePlan, ReturnType,
    SecurityRequirementPlan, TypeExpr,
};
use crate::parse::components::Components;
use crate::parse::extensions::EXT_DEPRECATION_MESSAGE;
use crate::parse::header::{Header, HeaderOrRef};
use crate::parse::operation::{Operation, PathItem};
use crate::parse::parameter::{self, Parameter, ParameterOrRef};
use crate::parse::request_body::{RequestBody, RequestBodyOrRef};
use crate::parse::response::{Response, ResponseOrRef};
use crate::parse::spec::OpenApiSpec;

use super::name_normalizer::{claim_identifier, normalize_name, path_slots, route_to_name};
use super::registry::TypeRegistry;
use super::schema_node::{CompositeMode, NodeKind, ScalarKind, SchemaNode};
use super::type_mapper::{MapContext, MergedProperty, TypeMapper};

pub const API_MODULE: &str = "api";

/// Either an inline component or a `$ref` to one.
enum Slot<'s, T> {
    Inline(&'s T),
    Ref(&'s str),
}

/// A `$ref`-able component kind under `#/components/<section>/`.
trait Referable: Sized {
    type Target;
    const PREFIX: &'static str;
    fn slot(&self) -> Slot<'_, Self::Target>;
    fn section(components: &Components) -> &IndexMap<String, Self>;
}

macro_rules! referable {
    ($or_ref:ident, $variant:ident, $target:ty, $prefix:literal, $section:ident) => {
        impl Referable for $or_ref {
            type Target = $target;
            const PREFIX: &'static str = $prefix;
            fn slot(&self) -> Slot<'_, $target> {
                match self {
                    $or_ref::Ref { ref_path } => Slot::Ref(ref_path),
                    $or_ref::$variant(inner) => Slot::Inline(inner),
                }
            }
            fn section(components: &Components) -> &IndexMap<String, Self> {
                &components.$section
            }
        }
    };
}

referable!(ParameterOrRef, Parameter, Parameter, "#/components/parameters/", parameters);
referable!(RequestBodyOrRef, RequestBody, RequestBody, "#/components/requestBodies/", request_bodies);
referable!(ResponseOrRef, Response, Response, "#/components/responses/", responses);
referable!(HeaderOrRef, Header, Header, "#/components/headers/", headers);

/// Follow `$ref`s to a component until an inline definition is reached.
fn resolve_component<'s, R: Referable>(
    spec: &'s OpenApiSpec,
    item: &'s R,
    from: &str,
) -> Result<&'s R::Target, PlanError> {
    let mut current = item;
    let mut seen: Vec<&str> = Vec::new();
    loop {
        match current.slot() {
            Slot::Inline(target) => return Ok(target),
            Slot::Ref(path) => {
                if seen.contains(&path) {
                    seen.push(path);
                    return Err(PlanError::CyclicReferenceUnsupported {
                        names: seen.iter().map(|s| s.to_string()).collect(),
                    });
                }
                seen.push(path);
                current = path
                    .strip_prefix(R::PREFIX)
                    .and_then(|name| R::section(spec.components.as_ref()?).get(name))
                    .ok_or_else(|| PlanError::unresolved(path, from))?;
            }
        }
    }
}

/// Plan every operation and group them into interfaces.
pub fn plan_operations(
    spec: &OpenApiSpec,
    registry: &TypeRegistry,
    config: &PlanConfig,
) -> Result<Vec<InterfaceFilePlan>, PlanError> {
    let mapper = TypeMapper::new(registry, config);

    let mut sites = Vec::new();
    for (path, item) in &spec.paths {
        collect_operations(path, item, &mut sites);
    }

    let results: Vec<Result<OperationPlan, PlanError>> = if config.parallel {
        sites
            .par_iter()
            .map(|site| plan_operation(spec, &mapper, site))
            .collect()
    } else {
        sites
            .iter()
            .map(|site| plan_operation(spec, &mapper, site))
            .collect()
    };
    let operations = results.into_iter().collect::<Result<Vec<_>, _>>()?;

    let interfaces = group_operations(&operations, &config.grouping)
        .into_iter()
        .map(|group| {
            let ops: Vec<OperationPlan> = group
                .operation_indices
                .iter()
                .map(|&i| operations[i].clone())
                .collect();
            build_interface(spec, config, group.key, ops)
        })
        .collect::<Vec<_>>();

    log::debug!(
        "planned {} operations into {} interfaces",
        operations.len(),
        interfaces.len()
    );
    Ok(interfaces)
}

/// One operation in the document, with the path item it lives under.
pub struct OperationSite<'s> {
    pub path: &'s str,
    pub method: HttpMethod,
    pub item: &'s PathItem,
    pub operation: &'s Operation,
}

fn collect_operations<'s>(path: &'s str, item: &'s PathItem, out: &mut Vec<OperationSite<'s>>) {
    macro_rules! add_op {
        ($method:expr, $op:expr) => {
            if let Some(ref operation) = $op {
                out.push(OperationSite {
                    path,
                    method: $method,
                    item,
                    operation,
                });
            }
        };
    }

    add_op!(HttpMethod::Get, item.get);
    add_op!(HttpMethod::Post, item.post);
    add_op!(HttpMethod::Put, item.put);
    add_op!(HttpMethod::Delete, item.delete);
    add_op!(HttpMethod::Patch, item.patch);
    add_op!(HttpMethod::Options, item.options);
    add_op!(HttpMethod::Head, item.head);
    add_op!(HttpMethod::Trace, item.trace);
}

fn build_interface(
    spec: &OpenApiSpec,
    config: &PlanConfig,
    key: String,
    operations: Vec<OperationPlan>,
) -> InterfaceFilePlan {
    let mut references = BTreeSet::new();
    let mut external_imports = BTreeSet::new();
    for mapped in operations.iter().flat_map(OperationPlan::mapped_types) {
        references.extend(mapped.references.iter().cloned());
        external_imports.extend(mapped.external_imports.iter().cloned());
    }
    let description = match config.grouping.by {
        GroupBy::Tag => spec.tag_description(&key).map(str::to_string),
        GroupBy::Route | GroupBy::Operation => None,
    };
    InterfaceFilePlan {
        name: format!(
            "{}{}",
            normalize_name(&key).pascal_case,
            config.grouping.interface_suffix
        ),
        group_key: key,
        description,
        module_path: API_MODULE.to_string(),
        operations,
        references,
        external_imports,
    }
}

/// Resolved operation name: naming strategy, then alias table.
fn operation_name(site: &OperationSite<'_>, config: &PlanConfig) -> String {
    let raw_name = match config.naming.strategy {
        NamingStrategy::UseOperationId => site
            .operation
            .operation_id
            .clone()
            .unwrap_or_else(|| route_to_name(site.method.as_str(), site.path)),
        NamingStrategy::UseRouteBased => route_to_name(site.method.as_str(), site.path),
    };
    match config.naming.aliases.get(&raw_name) {
        Some(alias) => alias.clone(),
        None => raw_name,
    }
}

pub fn plan_operation(
    spec: &OpenApiSpec,
    mapper: &TypeMapper<'_>,
    site: &OperationSite<'_>,
) -> Result<OperationPlan, PlanError> {
    let config = mapper.config();
    let op = site.operation;
    let operation_id = operation_name(site, config);

    let declared = merged_parameters(spec, site, &operation_id)?;
    let slots = path_slots(site.path);
    check_path_parameters(&operation_id, site.path, &slots, &declared)?;

    let mut parameters = declared
        .iter()
        .map(|p| plan_parameter(mapper, &operation_id, p))
        .collect::<Result<Vec<_>, _>>()?;

    let request_body = match &op.request_body {
        Some(body) => {
            let body = resolve_component(spec, body, &operation_id)?;
            let plan = plan_request_body(mapper, &operation_id, body)?;
            parameters.extend(body_parameters(mapper, &operation_id, body, &plan)?);
            Some(plan)
        }
        None => None,
    };

    // Stable: declaration order survives inside each location.
    parameters.sort_by_key(|p| p.location);
    let mut taken = HashSet::new();
    for p in &mut parameters {
        p.ident = claim_identifier(std::mem::take(&mut p.ident), &mut taken);
    }

    let responses = op
        .responses
        .iter()
        .map(|(status, response)| {
            let response = resolve_component(spec, response, &operation_id)?;
            plan_response(spec, mapper, &operation_id, status, response)
        })
        .collect::<Result<Vec<_>, PlanError>>()?;

    let plan = OperationPlan {
        name: normalize_name(&operation_id),
        method: site.method,
        path: site.path.to_string(),
        path_slots: slots,
        summary: op.summary.clone(),
        description: op.description.clone(),
        tags: op.tags.clone(),
        parameters,
        request_body,
        return_type: infer_return_type(&responses),
        security: plan_security(spec, op),
        deprecated: op.deprecated.unwrap_or(false).then(|| Deprecation {
            message: op.ext().string(EXT_DEPRECATION_MESSAGE).map(str::to_string),
        }),
        responses,
        operation_id,
    };
    log::debug!(
        "planned operation {} {} {}",
        plan.operation_id,
        plan.method.as_str(),
        plan.path
    );
    Ok(plan)
}

/// Path-item parameters overlaid by operation parameters with the same name and location.
fn merged_parameters<'s>(
    spec: &'s OpenApiSpec,
    site: &OperationSite<'s>,
    operation_id: &str,
) -> Result<Vec<&'s Parameter>, PlanError> {
    let mut merged: IndexMap<(String, parameter::ParameterLocation), &'s Parameter> = IndexMap::new();
    for p in site.item.parameters.iter().chain(&site.operation.parameters) {
        let p = resolve_component(spec, p, operation_id)?;
        merged.insert((p.name.clone(), p.location), p);
    }
    Ok(merged.into_values().collect())
}

fn check_path_parameters(
    operation_id: &str,
    path: &str,
    slots: &[String],
    declared: &[&Parameter],
) -> Result<(), PlanError> {
    let path_params: Vec<&str> = declared
        .iter()
        .filter(|p| p.location == parameter::ParameterLocation::Path)
        .map(|p| p.name.as_str())
        .collect();
    let missing: Vec<String> = slots
        .iter()
        .filter(|s| !path_params.contains(&s.as_str()))
        .cloned()
        .collect();
    let undeclared: Vec<String> = path_params
        .iter()
        .filter(|p| !slots.iter().any(|s| s == *p))
        .map(|p| p.to_string())
        .collect();
    if missing.is_empty() && undeclared.is_empty() {
        return Ok(());
    }
    Err(PlanError::PathParameterMismatch {
        operation_id: operation_id.to_string(),
        path: path.to_string(),
        missing,
        undeclared,
    })
}

fn plan_parameter(
    mapper: &TypeMapper<'_>,
    operation_id: &str,
    param: &Parameter,
) -> Result<ParameterPlan, PlanError> {
    let location = match param.location {
        parameter::ParameterLocation::Path => ParameterLocation::Path,
        parameter::ParameterLocation::Header => ParameterLocation::Header,
        parameter::ParameterLocation::Query => ParameterLocation::Query,
        parameter::ParameterLocation::Cookie => ParameterLocation::Cookie,
    };
    let required = param.required || location == ParameterLocation::Path;
    let node = match &param.schema {
        Some(schema) => SchemaNode::from_schema_or_ref(schema, &format!("{operation_id}.{}", param.name))?,
        None => SchemaNode::scalar(ScalarKind::String),
    };
    let mapped = mapper.map(
        &node,
        MapContext::with_required(required),
        &format!("{operation_id}.{}", param.name),
    )?;
    let name = normalize_name(&param.name);
    Ok(ParameterPlan {
        ident: mapper.config().field_ident(&name),
        name,
        wire_name: param.name.clone(),
        location,
        mapped,
        required,
        default_value: node.meta.default_value.clone(),
        description: param.description.clone(),
        deprecated: param.deprecated.unwrap_or(false).then(|| Deprecation {
            message: param.ext().string(EXT_DEPRECATION_MESSAGE).map(str::to_string),
        }),
        content_type: None,
    })
}

fn plan_request_body(
    mapper: &TypeMapper<'_>,
    operation_id: &str,
    body: &RequestBody,
) -> Result<RequestBodyPlan, PlanError> {
    let contents = body
        .content
        .iter()
        .map(|(media_type, content)| {
            let mapped = content
                .schema
                .as_ref()
                .map(|schema| {
                    mapper.map_schema(
                        schema,
                        MapContext::with_required(body.required),
                        &format!("{operation_id}.body"),
                    )
                })
                .transpose()?;
            Ok(MediaTypePlan {
                media_type: media_type.clone(),
                mapped,
            })
        })
        .collect::<Result<Vec<_>, PlanError>>()?;

    let mut typed = contents.iter().filter_map(|c| c.mapped.as_ref().map(|m| (c, m)));
    if let Some((first, first_type)) = typed.next() {
        if let Some((other, _)) = typed.find(|(_, m)| m.expr != first_type.expr) {
            return Err(PlanError::MultipleBodyMediaTypesConflict {
                operation_id: operation_id.to_string(),
                first: first.media_type.clone(),
                second: other.media_type.clone(),
            });
        }
    }

    Ok(RequestBodyPlan {
        required: body.required,
        description: body.description.clone(),
        contents,
    })
}

/// Form bodies over an object expand to one form field per property; any
/// other body binds as a single parameter.
fn body_parameters(
    mapper: &TypeMapper<'_>,
    operation_id: &str,
    body: &RequestBody,
    plan: &RequestBodyPlan,
) -> Result<Vec<ParameterPlan>, PlanError> {
    let Some((media_type, content)) = body.content.first() else {
        return Ok(Vec::new());
    };

    if body.is_form() {
        if let Some(schema) = &content.schema {
            let node = SchemaNode::from_schema_or_ref(schema, &format!("{operation_id}.body"))?;
            let object_node = match &node.kind {
                NodeKind::Reference { name } => mapper.registry().resolve(name)?,
                _ => &node,
            };
            if let Some(properties) = object_properties(mapper, object_node, operation_id)? {
                return properties
                    .iter()
                    .map(|prop| {
                        let part_type = content.encoding.get(&prop.name).and_then(|e| e.content_type.clone());
                        form_field(mapper, operation_id, prop, part_type)
                    })
                    .collect();
            }
        }
    }

    let Some(mapped) = plan.contents.first().and_then(|c| c.mapped.clone()) else {
        log::debug!("{operation_id}: body '{media_type}' has no schema, no body parameter");
        return Ok(Vec::new());
    };
    let wire_name = match &mapped.expr {
        TypeExpr::Named { schema, .. } => normalize_name(schema).camel_case,
        _ => "body".to_string(),
    };
    let name = normalize_name(&wire_name);
    Ok(vec![ParameterPlan {
        ident: mapper.config().field_ident(&name),
        name,
        wire_name,
        location: ParameterLocation::Body,
        mapped,
        required: body.required,
        default_value: None,
        description: body.description.clone(),
        deprecated: None,
        content_type: Some(media_type.clone()),
    }])
}

fn object_properties<'n>(
    mapper: &'n TypeMapper<'_>,
    node: &'n SchemaNode,
    operation_id: &str,
) -> Result<Option<Vec<MergedProperty<'n>>>, PlanError> {
    match &node.kind {
        NodeKind::Object { properties, .. } => Ok(Some(
            properties
                .iter()
                .map(|p| MergedProperty {
                    name: p.name.clone(),
                    node: &p.node,
                    required: p.required,
                })
                .collect(),
        )),
        NodeKind::Composite {
            mode: CompositeMode::AllOf,
            parts,
            ..
        } => Ok(Some(mapper.merge_all_of(parts, &format!("{operation_id}.body"))?.0)),
        _ => Ok(None),
    }
}

fn form_field(
    mapper: &TypeMapper<'_>,
    operation_id: &str,
    prop: &MergedProperty<'_>,
    content_type: Option<String>,
) -> Result<ParameterPlan, PlanError> {
    let mapped = mapper.map(
        prop.node,
        MapContext::with_required(prop.required),
        &format!("{operation_id}.{}", prop.name),
    )?;
    let name = normalize_name(&prop.name);
    let meta = &prop.node.meta;
    Ok(ParameterPlan {
        ident: mapper.config().field_ident(&name),
        name,
        wire_name: prop.name.clone(),
        location: ParameterLocation::FormField,
        mapped,
        required: prop.required,
        default_value: meta.default_value.clone(),
        description: meta.description.clone(),
        deprecated: meta.deprecated.then(|| Deprecation {
            message: meta.deprecation_message.clone(),
        }),
        content_type,
    })
}

fn plan_response(
    spec: &OpenApiSpec,
    mapper: &TypeMapper<'_>,
    operation_id: &str,
    status: &str,
    response: &Response,
) -> Result<ResponsePlan, PlanError> {
    let location = format!("{operation_id}.responses.{status}");
    let contents = response
        .content
        .iter()
        .map(|(media_type, content)| {
            let mapped = content
                .schema
                .as_ref()
                .map(|schema| mapper.map_schema(schema, MapContext::required(), &location))
                .transpose()?;
            Ok(MediaTypePlan {
                media_type: media_type.clone(),
                mapped,
            })
        })
        .collect::<Result<Vec<_>, PlanError>>()?;

    let headers = response
        .headers
        .iter()
        .map(|(name, header)| {
            let header = resolve_component(spec, header, &location)?;
            plan_header(mapper, &format!("{location}.headers.{name}"), name, header)
        })
        .collect::<Result<Vec<_>, PlanError>>()?;

    Ok(ResponsePlan {
        status: status.to_string(),
        description: response.description.clone(),
        contents,
        headers,
    })
}

fn plan_header(
    mapper: &TypeMapper<'_>,
    location: &str,
    name: &str,
    header: &Header,
) -> Result<HeaderPlan, PlanError> {
    let ctx = MapContext::with_required(header.required);
    let mapped = match &header.schema {
        Some(schema) => mapper.map_schema(schema, ctx, location)?,
        None => mapper.map(&SchemaNode::scalar(ScalarKind::String), ctx, location)?,
    };
    Ok(HeaderPlan {
        name: name.to_string(),
        mapped,
        required: header.required,
        description: header.description.clone(),
        deprecated: header.deprecated.unwrap_or(false).then(|| Deprecation {
            message: header.ext().string(EXT_DEPRECATION_MESSAGE).map(str::to_string),
        }),
    })
}

/// `Void` without success content, `Typed` when every success media type
/// maps to the same type, `Untyped` otherwise.
fn infer_return_type(responses: &[ResponsePlan]) -> ReturnType {
    let mut success: Vec<&MappedType> = responses
        .iter()
        .filter(|r| r.is_success())
        .flat_map(|r| r.contents.iter().filter_map(|c| c.mapped.as_ref()))
        .collect();
    if success.is_empty() {
        return ReturnType::Void;
    }
    let first = success.remove(0);
    if success.iter().all(|m| m.expr == first.expr) {
        ReturnType::Typed {
            mapped: first.clone(),
        }
    } else {
        ReturnType::Untyped
    }
}

/// Operation security, falling back to the document default.
fn plan_security(spec: &OpenApiSpec, op: &Operation) -> Vec<SecurityRequirementPlan> {
    let requirements = op.security.as_ref().or(spec.security.as_ref());
    let schemes = spec.components.as_ref().map(|c| &c.security_schemes);
    requirements
        .into_iter()
        .flatten()
        .flat_map(|requirement| requirement.iter())
        .map(|(scheme, scopes)| SecurityRequirementPlan {
            scheme: scheme.clone(),
            kind: schemes.and_then(|s| s.get(scheme)).map(|s| s.scheme_type),
            scopes: scopes.clone(),
        })
        .collect()
}
