pub mod config;
pub mod error;
pub mod ir;
pub mod parse;
pub mod transform;

pub use transform::plan_spec;

/// A rendered file with path and content.
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

/// Turns an emission plan into source text. Renderers consume files in
/// plan order and use each file's resolved imports as given.
pub trait PlanRenderer {
    type Error: std::error::Error;
    fn render(
        &self,
        plan: &ir::EmissionPlan,
        config: &config::PlanConfig,
    ) -> Result<Vec<GeneratedFile>, Self::Error>;
}
