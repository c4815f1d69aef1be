use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use indexmap::IndexMap;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::config::{EmissionOrdering, PlanConfig};
use crate::error::PlanError;
use crate::ir::{
    EmissionPlan, FileContent, FilePlan, ImportPlan, InterfaceFilePlan, ModelFilePlan,
};

/// Assemble planned models and interfaces into the final emission order.
///
/// Files are keyed by output path. A second plan for the same path is
/// dropped when its content is structurally equal to the first and is a
/// [`PlanError::NameCollision`] otherwise. Imports are resolved against the
/// surviving files; ordering follows `config.ordering`.
pub fn orchestrate(
    models: Vec<ModelFilePlan>,
    interfaces: Vec<InterfaceFilePlan>,
    config: &PlanConfig,
) -> Result<EmissionPlan, PlanError> {
    let (contents, defined_by) = deduplicate(
        models
            .into_iter()
            .map(FileContent::Model)
            .chain(interfaces.into_iter().map(FileContent::Interface)),
    )?;

    let dependencies = contents
        .iter()
        .enumerate()
        .map(|(index, content)| file_dependencies(index, content, &defined_by))
        .collect::<Result<Vec<_>, _>>()?;

    let components = strongly_connected(&dependencies);
    let cyclic: Vec<&Vec<usize>> = components.iter().filter(|c| c.len() > 1).collect();
    if config.ordering == EmissionOrdering::Strict {
        if let Some(component) = cyclic.first() {
            return Err(PlanError::CyclicReferenceUnsupported {
                names: component.iter().map(|&i| contents[i].origin().to_string()).collect(),
            });
        }
    }
    let cycle_groups: Vec<Vec<String>> = cyclic
        .iter()
        .map(|c| c.iter().map(|&i| contents[i].name().to_string()).collect())
        .collect();

    let order = emission_order(&components, &dependencies);
    let position: HashMap<usize, usize> = order.iter().enumerate().map(|(pos, &i)| (i, pos)).collect();

    let snapshot: Vec<(String, String)> = contents
        .iter()
        .map(|c| (c.name().to_string(), c.module_path().to_string()))
        .collect();
    let mut slots: Vec<Option<FileContent>> = contents.into_iter().map(Some).collect();

    let mut files = Vec::with_capacity(order.len());
    for &index in &order {
        let Some(content) = slots[index].take() else {
            continue;
        };
        let module_path = content.module_path().to_string();
        let mut imports: BTreeSet<ImportPlan> = dependencies[index]
            .iter()
            .map(|&dep| {
                let (name, dep_module) = &snapshot[dep];
                ImportPlan {
                    name: name.clone(),
                    qualified: qualified_name(&config.root_package, dep_module, name),
                    defined_in: Some(format!("{dep_module}/{name}")),
                    same_module: *dep_module == module_path,
                }
            })
            .collect();
        imports.extend(content.external_imports().iter().map(|fqn| external_import(fqn)));
        check_simple_names(&content, &config.root_package, &imports)?;

        let forward_references = dependencies[index]
            .iter()
            .filter(|&&dep| position[&dep] > position[&index])
            .map(|&dep| snapshot[dep].0.clone())
            .collect();

        files.push(FilePlan {
            name: content.name().to_string(),
            output_path: content.output_path(),
            module_path,
            imports: imports.into_iter().collect(),
            forward_references,
            content,
        });
    }

    for group in &cycle_groups {
        log::warn!("files {group:?} import each other; emitted with forward references");
    }
    Ok(EmissionPlan {
        files,
        cycle_groups,
    })
}

/// A file cannot refer to two different types by the same simple name,
/// nor import a type that shares its own name.
fn check_simple_names(
    content: &FileContent,
    root_package: &str,
    imports: &BTreeSet<ImportPlan>,
) -> Result<(), PlanError> {
    let own = qualified_name(root_package, content.module_path(), content.name());
    let mut claimed: HashMap<&str, &str> = HashMap::from([(content.name(), own.as_str())]);
    for import in imports {
        match claimed.insert(&import.name, &import.qualified) {
            Some(first) if first != import.qualified => {
                return Err(PlanError::NameCollision {
                    name: format!("{} in {}", import.name, content.output_path()),
                    first: first.to_string(),
                    second: import.qualified.clone(),
                });
            }
            _ => {}
        }
    }
    Ok(())
}

/// Drop repeated plans for one output path. Returns the surviving contents
/// in first-seen order and, for every schema name seen, the index of the
/// file that defines it.
fn deduplicate(
    candidates: impl Iterator<Item = FileContent>,
) -> Result<(Vec<FileContent>, HashMap<String, usize>), PlanError> {
    let mut by_path: IndexMap<String, FileContent> = IndexMap::new();
    let mut defined_by: HashMap<String, usize> = HashMap::new();

    for content in candidates {
        let path = content.output_path();
        let schema_name = match &content {
            FileContent::Model(model) => Some(model.schema_name.clone()),
            FileContent::Interface(_) => None,
        };
        let index = match by_path.get_full(&path) {
            Some((index, _, existing)) => {
                if !existing.same_structure(&content) {
                    return Err(PlanError::NameCollision {
                        name: path,
                        first: existing.origin().to_string(),
                        second: content.origin().to_string(),
                    });
                }
                log::debug!("dropping duplicate plan for {path} from '{}'", content.origin());
                index
            }
            None => by_path.insert_full(path, content).0,
        };
        if let Some(schema_name) = schema_name {
            defined_by.insert(schema_name, index);
        }
    }
    Ok((by_path.into_values().collect(), defined_by))
}

/// Indices of the files `content` imports, without itself.
fn file_dependencies(
    index: usize,
    content: &FileContent,
    defined_by: &HashMap<String, usize>,
) -> Result<BTreeSet<usize>, PlanError> {
    let mut deps = BTreeSet::new();
    for reference in content.references() {
        let &target = defined_by
            .get(reference)
            .ok_or_else(|| PlanError::unresolved(reference.as_str(), content.output_path()))?;
        if target != index {
            deps.insert(target);
        }
    }
    Ok(deps)
}

/// Strongly connected components of the import graph, each sorted by file index.
fn strongly_connected(dependencies: &[BTreeSet<usize>]) -> Vec<Vec<usize>> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..dependencies.len()).map(|i| graph.add_node(i)).collect();
    for (from, deps) in dependencies.iter().enumerate() {
        for &to in deps {
            graph.add_edge(nodes[from], nodes[to], ());
        }
    }
    let mut components: Vec<Vec<usize>> = tarjan_scc(&graph)
        .into_iter()
        .map(|c| {
            let mut members: Vec<usize> = c.into_iter().map(|n| graph[n]).collect();
            members.sort_unstable();
            members
        })
        .collect();
    components.sort_by_key(|c| c[0]);
    components
}

/// Kahn's algorithm over the components: a component is ready once every
/// component it imports from is emitted; ties go to the smallest file
/// index so the order only depends on the input order.
fn emission_order(components: &[Vec<usize>], dependencies: &[BTreeSet<usize>]) -> Vec<usize> {
    let mut component_of = vec![0; dependencies.len()];
    for (c, members) in components.iter().enumerate() {
        for &m in members {
            component_of[m] = c;
        }
    }

    let mut pending = vec![0usize; components.len()];
    let mut dependents: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); components.len()];
    for (c, members) in components.iter().enumerate() {
        let upstream: BTreeSet<usize> = members
            .iter()
            .flat_map(|&m| dependencies[m].iter().map(|&d| component_of[d]))
            .filter(|&d| d != c)
            .collect();
        pending[c] = upstream.len();
        for u in upstream {
            dependents[u].insert(c);
        }
    }

    // Components are sorted by smallest member, so the component index is the tie-breaker.
    let mut ready: BinaryHeap<Reverse<usize>> = (0..components.len())
        .filter(|&c| pending[c] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::with_capacity(dependencies.len());
    while let Some(Reverse(c)) = ready.pop() {
        order.extend(&components[c]);
        for &d in &dependents[c] {
            pending[d] -= 1;
            if pending[d] == 0 {
                ready.push(Reverse(d));
            }
        }
    }
    order
}

/// Dotted path `<root>.<module>.<name>`; empty segments are skipped.
pub fn qualified_name(root_package: &str, module_path: &str, name: &str) -> String {
    root_package
        .split('.')
        .chain(module_path.split('/'))
        .chain(std::iter::once(name))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

fn external_import(fqn: &str) -> ImportPlan {
    let name = fqn.rsplit('.').next().unwrap_or(fqn);
    ImportPlan {
        name: name.to_string(),
        qualified: fqn.to_string(),
        defined_in: None,
        same_module: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ModelBody, Primitive};

    fn model(name: &str, refs: &[&str]) -> ModelFilePlan {
        ModelFilePlan {
            name: name.to_string(),
            schema_name: name.to_string(),
            module_path: "model".to_string(),
            description: None,
            deprecated: None,
            body: ModelBody::Record {
                fields: vec![],
                additional_properties: None,
            },
            supertypes: vec![],
            requires_indirection: false,
            references: refs.iter().map(|r| r.to_string()).collect(),
            external_imports: BTreeSet::new(),
        }
    }

    fn interface(name: &str, refs: &[&str]) -> InterfaceFilePlan {
        InterfaceFilePlan {
            name: name.to_string(),
            group_key: name.to_lowercase(),
            description: None,
            module_path: "api".to_string(),
            operations: vec![],
            references: refs.iter().map(|r| r.to_string()).collect(),
            external_imports: BTreeSet::new(),
        }
    }

    fn names(plan: &EmissionPlan) -> Vec<&str> {
        plan.files.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_dependencies_emitted_first() {
        let plan = orchestrate(
            vec![
                model("Order", &["OrderItem", "Customer"]),
                model("OrderItem", &[]),
                model("Customer", &["Address"]),
                model("Address", &[]),
            ],
            vec![interface("OrdersApi", &["Order"])],
            &PlanConfig::default(),
        )
        .unwrap();
        assert_eq!(
            names(&plan),
            ["OrderItem", "Address", "Customer", "Order", "OrdersApi"]
        );
        assert!(plan.cycle_groups.is_empty());
        assert!(plan.files.iter().all(|f| f.forward_references.is_empty()));
    }

    #[test]
    fn test_import_resolution() {
        let mut order = model("Order", &["Customer"]);
        order.external_imports.insert("com.acme.Money".to_string());
        let mut customer = model("Customer", &[]);
        customer.module_path = "model/crm".to_string();

        let plan = orchestrate(
            vec![order, customer],
            vec![interface("OrdersApi", &["Order"])],
            &PlanConfig::default(),
        )
        .unwrap();

        let order = plan.file("Order").unwrap();
        assert_eq!(order.output_path, "model/Order");
        assert_eq!(
            order.imports,
            [
                ImportPlan {
                    name: "Customer".into(),
                    qualified: "generated.model.crm.Customer".into(),
                    defined_in: Some("model/crm/Customer".into()),
                    same_module: false,
                },
                ImportPlan {
                    name: "Money".into(),
                    qualified: "com.acme.Money".into(),
                    defined_in: None,
                    same_module: false,
                },
            ]
        );
        let api = plan.file("OrdersApi").unwrap();
        assert_eq!(api.imports[0].qualified, "generated.model.Order");
    }

    #[test]
    fn test_self_reference_is_not_an_import() {
        let plan = orchestrate(vec![model("Node", &["Node"])], vec![], &PlanConfig::default()).unwrap();
        assert!(plan.files[0].imports.is_empty());
        assert!(plan.cycle_groups.is_empty());
    }

    #[test]
    fn test_cycle_tolerant_groups() {
        let plan = orchestrate(
            vec![
                model("Parent", &["Child"]),
                model("Child", &["Parent"]),
                model("Leaf", &[]),
            ],
            vec![],
            &PlanConfig::default(),
        )
        .unwrap();
        assert_eq!(names(&plan), ["Parent", "Child", "Leaf"]);
        assert_eq!(plan.cycle_groups, [vec!["Parent".to_string(), "Child".to_string()]]);
        assert_eq!(plan.files[0].forward_references, ["Child"]);
        assert!(plan.files[1].forward_references.is_empty());
    }

    #[test]
    fn test_strict_rejects_cycles() {
        let config = PlanConfig {
            ordering: EmissionOrdering::Strict,
            ..PlanConfig::default()
        };
        let err = orchestrate(
            vec![model("Parent", &["Child"]), model("Child", &["Parent"])],
            vec![],
            &config,
        )
        .unwrap_err();
        assert_eq!(
            err,
            PlanError::CyclicReferenceUnsupported {
                names: vec!["Parent".into(), "Child".into()]
            }
        );
    }

    #[test]
    fn test_structurally_equal_duplicates_collapse() {
        let mut alias = model("ErrorDto", &[]);
        alias.schema_name = "error-dto".to_string();
        let plan = orchestrate(
            vec![model("ErrorDto", &[]), alias],
            vec![
                interface("TicketsApi", &["ErrorDto"]),
                interface("OrdersApi", &["error-dto"]),
            ],
            &PlanConfig::default(),
        )
        .unwrap();
        assert_eq!(plan.models().count(), 1);
        assert_eq!(plan.file("OrdersApi").unwrap().imports[0].name, "ErrorDto");
    }

    #[test]
    fn test_name_collision() {
        let mut other = model("ErrorDto", &[]);
        other.schema_name = "error_dto".to_string();
        other.body = ModelBody::Enumeration {
            base: Primitive::String,
            variants: vec![],
        };
        let err = orchestrate(vec![model("ErrorDto", &[]), other], vec![], &PlanConfig::default())
            .unwrap_err();
        assert_eq!(
            err,
            PlanError::NameCollision {
                name: "model/ErrorDto".into(),
                first: "ErrorDto".into(),
                second: "error_dto".into(),
            }
        );
    }

    #[test]
    fn test_imports_with_same_simple_name() {
        let mut crm = model("Customer", &[]);
        crm.schema_name = "customer".to_string();
        crm.module_path = "model/crm".to_string();
        let err = orchestrate(
            vec![model("Customer", &[]), crm],
            vec![interface("DefaultApi", &["Customer", "customer"])],
            &PlanConfig::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            PlanError::NameCollision {
                name: "Customer in api/DefaultApi".into(),
                first: "generated.model.Customer".into(),
                second: "generated.model.crm.Customer".into(),
            }
        );

        let mut order = model("Order", &[]);
        order.external_imports.insert("com.acme.Order".to_string());
        let err = orchestrate(vec![order], vec![], &PlanConfig::default()).unwrap_err();
        assert!(matches!(err, PlanError::NameCollision { .. }));
    }

    #[test]
    fn test_reference_without_file() {
        let err = orchestrate(vec![model("Order", &["Ghost"])], vec![], &PlanConfig::default())
            .unwrap_err();
        assert!(matches!(err, PlanError::UnresolvedReference { .. }));
    }

    #[test]
    fn test_qualified_name() {
        assert_eq!(qualified_name("com.acme", "model/crm", "Customer"), "com.acme.model.crm.Customer");
        assert_eq!(qualified_name("", "api", "PetsApi"), "api.PetsApi");
    }
}
