pub mod model_planner;
pub mod name_normalizer;
pub mod operation_planner;
pub mod orchestrator;
pub mod pipeline;
pub mod promote_inline;
pub mod registry;
pub mod schema_node;
pub mod type_mapper;

pub use pipeline::plan_spec;
pub use registry::TypeRegistry;
pub use type_mapper::{MapContext, TypeMapper};
