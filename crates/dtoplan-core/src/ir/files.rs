use std::collections::BTreeSet;

use serde::Serialize;

use super::models::ModelFilePlan;
use super::operations::InterfaceFilePlan;

/// Content of one emitted compilation unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileContent {
    Model(ModelFilePlan),
    Interface(InterfaceFilePlan),
}

impl FileContent {
    pub fn name(&self) -> &str {
        match self {
            FileContent::Model(m) => &m.name,
            FileContent::Interface(i) => &i.name,
        }
    }

    pub fn module_path(&self) -> &str {
        match self {
            FileContent::Model(m) => &m.module_path,
            FileContent::Interface(i) => &i.module_path,
        }
    }

    /// Schema name for models, group key for interfaces.
    pub fn origin(&self) -> &str {
        match self {
            FileContent::Model(m) => &m.schema_name,
            FileContent::Interface(i) => &i.group_key,
        }
    }

    /// Canonical schema names this file refers to.
    pub fn references(&self) -> &BTreeSet<String> {
        match self {
            FileContent::Model(m) => &m.references,
            FileContent::Interface(i) => &i.references,
        }
    }

    pub fn external_imports(&self) -> &BTreeSet<String> {
        match self {
            FileContent::Model(m) => &m.external_imports,
            FileContent::Interface(i) => &i.external_imports,
        }
    }

    /// `module_path/name`, unique per emitted file.
    pub fn output_path(&self) -> String {
        format!("{}/{}", self.module_path(), self.name())
    }

    /// Value equality ignoring where the content came from.
    pub fn same_structure(&self, other: &FileContent) -> bool {
        match (self, other) {
            (FileContent::Model(a), FileContent::Model(b)) => {
                ModelFilePlan {
                    schema_name: String::new(),
                    ..a.clone()
                } == ModelFilePlan {
                    schema_name: String::new(),
                    ..b.clone()
                }
            }
            (FileContent::Interface(a), FileContent::Interface(b)) => {
                InterfaceFilePlan {
                    group_key: String::new(),
                    ..a.clone()
                } == InterfaceFilePlan {
                    group_key: String::new(),
                    ..b.clone()
                }
            }
            _ => false,
        }
    }
}

/// A resolved import of one file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ImportPlan {
    /// Type name as written at the use site.
    pub name: String,
    /// Dotted fully qualified path.
    pub qualified: String,
    /// Defining file's output path; `None` for external types.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defined_in: Option<String>,
    /// Defined in the importer's own module; renderers may skip the import.
    pub same_module: bool,
}

/// Renderer-ready description of one output file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilePlan {
    pub name: String,
    pub module_path: String,
    /// `module_path/name`, without extension.
    pub output_path: String,
    pub imports: Vec<ImportPlan>,
    /// Imports not emitted before this file (cycle-tolerant ordering only).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub forward_references: Vec<String>,
    pub content: FileContent,
}

impl FilePlan {
    pub fn as_model(&self) -> Option<&ModelFilePlan> {
        match &self.content {
            FileContent::Model(m) => Some(m),
            FileContent::Interface(_) => None,
        }
    }

    pub fn as_interface(&self) -> Option<&InterfaceFilePlan> {
        match &self.content {
            FileContent::Interface(i) => Some(i),
            FileContent::Model(_) => None,
        }
    }
}

/// Ordered, import-resolved output of a planning run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmissionPlan {
    pub files: Vec<FilePlan>,
    /// Output names of files that import each other in a cycle.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cycle_groups: Vec<Vec<String>>,
}

impl EmissionPlan {
    pub fn models(&self) -> impl Iterator<Item = &ModelFilePlan> {
        self.files.iter().filter_map(FilePlan::as_model)
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &InterfaceFilePlan> {
        self.files.iter().filter_map(FilePlan::as_interface)
    }

    pub fn file(&self, name: &str) -> Option<&FilePlan> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.files.iter().position(|f| f.name == name)
    }
}
