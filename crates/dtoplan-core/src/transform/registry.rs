use std::collections::{BTreeSet, HashMap, HashSet};

use indexmap::IndexMap;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::config::PlanConfig;
use crate::error::PlanError;
use crate::parse::spec::OpenApiSpec;

use super::promote_inline::promote_inline_schemas;
use super::schema_node::{NodeKind, SchemaNode};

/// Every named schema component of a run, keyed by canonical name.
///
/// Other structures refer to registered schemas by name only; a reference is
/// a lookup here, never a copy.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    nodes: IndexMap<String, SchemaNode>,
    indirection: BTreeSet<String>,
    cycle_groups: Vec<Vec<String>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry for a spec: convert, promote inline schemas, check
    /// every reference resolves and flag cycle participants.
    pub fn from_spec(spec: &OpenApiSpec, config: &PlanConfig) -> Result<Self, PlanError> {
        let components = spec
            .component_schemas()
            .map(|(name, schema)| Ok((name.clone(), SchemaNode::from_schema_or_ref(schema, name)?)))
            .collect::<Result<Vec<_>, PlanError>>()?;

        let components = if config.promote_inline {
            promote_inline_schemas(components)
        } else {
            components
        };

        let mut registry = Self::new();
        for (name, node) in components {
            registry.register(name, node)?;
        }
        registry.validate_references()?;
        registry.detect_cycles();

        log::debug!(
            "registered {} schemas, {} in reference cycles",
            registry.len(),
            registry.indirection.len()
        );
        Ok(registry)
    }

    pub fn register(&mut self, name: impl Into<String>, node: SchemaNode) -> Result<(), PlanError> {
        let name = name.into();
        if self.nodes.contains_key(&name) {
            return Err(PlanError::DuplicateName { name });
        }
        self.nodes.insert(name, node);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// The concrete node registered under `name`, following chains of
    /// schemas that are only references to other schemas.
    pub fn resolve(&self, name: &str) -> Result<&SchemaNode, PlanError> {
        let mut current = name;
        let mut seen: Vec<&str> = Vec::new();
        loop {
            let node = self
                .nodes
                .get(current)
                .ok_or_else(|| PlanError::unresolved(current, seen.last().copied().unwrap_or(name)))?;
            match &node.kind {
                NodeKind::Reference { name: next } => {
                    seen.push(current);
                    if seen.contains(&next.as_str()) {
                        return Err(PlanError::CyclicReferenceUnsupported {
                            names: seen.iter().map(|s| s.to_string()).collect(),
                        });
                    }
                    current = next;
                }
                _ => return Ok(node),
            }
        }
    }

    /// Check every reference inside every registered node names a registered schema.
    pub fn validate_references(&self) -> Result<(), PlanError> {
        for (name, node) in &self.nodes {
            if let Some(missing) = node.references().into_iter().find(|r| !self.contains(r)) {
                return Err(PlanError::unresolved(missing, name.as_str()));
            }
        }
        Ok(())
    }

    /// Flag every schema that sits in a reference cycle, including self-references.
    /// Returns the flagged names.
    pub fn detect_cycles(&mut self) -> BTreeSet<String> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let indices: HashMap<&str, NodeIndex> = self
            .nodes
            .keys()
            .map(|name| (name.as_str(), graph.add_node(name.as_str())))
            .collect();

        let mut self_loops: HashSet<&str> = HashSet::new();
        for (name, node) in &self.nodes {
            let from = indices[name.as_str()];
            let targets: BTreeSet<&str> = node.references().into_iter().collect();
            for target in targets {
                if target == name {
                    self_loops.insert(name.as_str());
                }
                if let Some(&to) = indices.get(target) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        let mut flagged = BTreeSet::new();
        let mut groups = Vec::new();
        for component in tarjan_scc(&graph) {
            let names: Vec<&str> = component.iter().map(|&ix| graph[ix]).collect();
            if names.len() > 1 || names.iter().any(|n| self_loops.contains(n)) {
                let mut group: Vec<String> = names.iter().map(|n| n.to_string()).collect();
                group.sort_by_key(|n| self.nodes.get_index_of(n));
                flagged.extend(group.iter().cloned());
                groups.push(group);
            }
        }
        groups.sort_by_key(|g| g.first().and_then(|n| self.nodes.get_index_of(n)));

        self.indirection = flagged.clone();
        self.cycle_groups = groups;
        flagged
    }

    /// Whether `name` participates in a reference cycle.
    pub fn requires_indirection(&self, name: &str) -> bool {
        self.indirection.contains(name)
    }

    /// Reference cycles among schemas, each in registry order.
    pub fn cycle_groups(&self) -> &[Vec<String>] {
        &self.cycle_groups
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SchemaNode)> {
        self.nodes.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.nodes.keys()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
