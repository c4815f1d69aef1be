use std::collections::HashSet;

use heck::ToPascalCase;

use super::name_normalizer::normalize_name;
use super::schema_node::{CompositeMode, NodeKind, NodeMeta, SchemaNode};

/// Promote inline objects and enums nested in component schemas to named
/// components, replacing them with references.
///
/// A property `shipping` of `Order` holding an inline object becomes the
/// component `OrderShipping`. Array items and map values take the name of the
/// property that holds the container. Promoted schemas are listed right after
/// the component that owned them.
pub fn promote_inline_schemas(components: Vec<(String, SchemaNode)>) -> Vec<(String, SchemaNode)> {
    let mut used_names: HashSet<String> = components
        .iter()
        .map(|(name, _)| normalize_name(name).pascal_case)
        .collect();

    let mut result = Vec::with_capacity(components.len());
    for (name, mut node) in components {
        let mut promoted = Vec::new();
        let context = normalize_name(&name).pascal_case;
        promote_children(&context, &mut node, &mut promoted, &mut used_names);
        result.push((name, node));
        result.append(&mut promoted);
    }
    result
}

/// Walk the slots of a named node without promoting the node itself.
fn promote_children(
    context: &str,
    node: &mut SchemaNode,
    promoted: &mut Vec<(String, SchemaNode)>,
    used_names: &mut HashSet<String>,
) {
    match &mut node.kind {
        NodeKind::Object {
            properties,
            additional,
        } => {
            for prop in properties.iter_mut() {
                let prop_ctx = format!("{}{}", context, normalize_name(&prop.name).pascal_case);
                promote_slot(&prop_ctx, &mut prop.node, promoted, used_names);
            }
            if let Some(additional) = additional {
                let value_ctx = format!("{context}Value");
                promote_slot(&value_ctx, additional, promoted, used_names);
            }
        }
        NodeKind::Array { items } => {
            let item_ctx = format!("{context}Item");
            promote_slot(&item_ctx, items, promoted, used_names);
        }
        NodeKind::Map { value, .. } => {
            let value_ctx = format!("{context}Value");
            promote_slot(&value_ctx, value, promoted, used_names);
        }
        NodeKind::Composite { mode, parts, .. } => {
            for (i, part) in parts.iter_mut().enumerate() {
                if *mode == CompositeMode::AllOf {
                    // Merged into the owner; only its own slots are candidates.
                    promote_children(context, part, promoted, used_names);
                } else {
                    let variant_ctx = format!("{}Variant{}", context, i + 1);
                    promote_slot(&variant_ctx, part, promoted, used_names);
                }
            }
        }
        NodeKind::Scalar(_) | NodeKind::Enum { .. } | NodeKind::Reference { .. } => {}
    }
}

/// Promote the node in a slot if it is an inline object or enum.
fn promote_slot(
    context: &str,
    node: &mut SchemaNode,
    promoted: &mut Vec<(String, SchemaNode)>,
    used_names: &mut HashSet<String>,
) {
    let promotable = match &node.kind {
        NodeKind::Object { properties, .. } => !properties.is_empty(),
        NodeKind::Enum { .. } => true,
        _ => false,
    };

    if !promotable {
        if matches!(node.kind, NodeKind::Object { .. } | NodeKind::Composite { .. }) {
            promote_children(context, node, promoted, used_names);
            return;
        }
        match &mut node.kind {
            NodeKind::Array { items } => promote_slot(context, items, promoted, used_names),
            NodeKind::Map { value, .. } => promote_slot(context, value, promoted, used_names),
            _ => {}
        }
        return;
    }

    let name = unique_name(context, used_names);
    let reference = SchemaNode {
        kind: NodeKind::Reference { name: name.clone() },
        meta: slot_meta(&node.meta),
    };
    let mut extracted = std::mem::replace(node, reference);
    extracted.meta.nullable = false;

    let mut nested = Vec::new();
    promote_children(&name, &mut extracted, &mut nested, used_names);
    promoted.push((name, extracted));
    promoted.append(&mut nested);
}

/// Keywords that describe the use site rather than the promoted type.
fn slot_meta(meta: &NodeMeta) -> NodeMeta {
    NodeMeta {
        nullable: meta.nullable,
        deprecated: meta.deprecated,
        deprecation_message: meta.deprecation_message.clone(),
        description: meta.description.clone(),
        default_value: meta.default_value.clone(),
        read_only: meta.read_only,
        write_only: meta.write_only,
        ..NodeMeta::default()
    }
}

/// Generate a unique PascalCase name, appending numeric suffixes if needed.
fn unique_name(base: &str, used_names: &mut HashSet<String>) -> String {
    let pascal = base.to_pascal_case();
    if used_names.insert(pascal.clone()) {
        return pascal;
    }
    let mut i = 2;
    loop {
        let candidate = format!("{pascal}{i}");
        if used_names.insert(candidate.clone()) {
            return candidate;
        }
        i += 1;
    }
}
