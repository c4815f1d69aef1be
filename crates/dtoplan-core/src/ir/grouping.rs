use indexmap::IndexMap;

use super::operations::OperationPlan;
use crate::config::{GroupBy, GroupingConfig};

/// Operations sharing one interface, as indices into the planned list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationGroup {
    pub key: String,
    pub operation_indices: Vec<usize>,
}

/// Group planned operations according to the grouping strategy.
///
/// Groups come out in first-seen order and keep declaration order inside.
/// With a non-empty `include_tags`, groups whose key is not listed are dropped.
pub fn group_operations(operations: &[OperationPlan], config: &GroupingConfig) -> Vec<OperationGroup> {
    let mut groups: IndexMap<String, Vec<usize>> = IndexMap::new();

    for (i, op) in operations.iter().enumerate() {
        let key = match config.by {
            GroupBy::Tag => op
                .tags
                .first()
                .cloned()
                .unwrap_or_else(|| config.default_key.clone()),
            GroupBy::Route => extract_path_prefix(&op.path, &config.default_key),
            GroupBy::Operation => op.operation_id.clone(),
        };
        groups.entry(key).or_default().push(i);
    }

    groups
        .into_iter()
        .filter(|(key, _)| config.include_tags.is_empty() || config.include_tags.contains(key))
        .map(|(key, operation_indices)| OperationGroup {
            key,
            operation_indices,
        })
        .collect()
}

/// Extract the first meaningful path segment as a group name.
/// e.g. "/pets/{petId}" → "pets", "/store/inventory" → "store"
fn extract_path_prefix(path: &str, default_key: &str) -> String {
    path.split('/')
        .find(|s| !s.is_empty() && !s.starts_with('{'))
        .unwrap_or(default_key)
        .to_string()
}
