use crate::config::PlanConfig;
use crate::error::PlanError;
use crate::ir::EmissionPlan;
use crate::parse::spec::OpenApiSpec;

use super::model_planner::plan_models;
use super::operation_planner::plan_operations;
use super::orchestrator::orchestrate;
use super::registry::TypeRegistry;

/// Plan a whole spec: build the registry once, plan models and operations
/// against it, then order and import-resolve the result.
///
/// Returns the complete plan or the first error; nothing partial.
pub fn plan_spec(spec: &OpenApiSpec, config: &PlanConfig) -> Result<EmissionPlan, PlanError> {
    let registry = TypeRegistry::from_spec(spec, config)?;
    for group in registry.cycle_groups() {
        log::info!("schemas {group:?} reference each other and require indirection");
    }

    let models = plan_models(&registry, config)?;
    let interfaces = plan_operations(spec, &registry, config)?;
    log::info!(
        "planned {} models and {} interfaces from {} schemas",
        models.len(),
        interfaces.len(),
        registry.len()
    );

    let plan = orchestrate(models, interfaces, config)?;
    log::info!("emission plan has {} files", plan.files.len());
    Ok(plan)
}
