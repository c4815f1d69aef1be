pub mod files;
pub mod grouping;
pub mod models;
pub mod operations;
pub mod types;

pub use files::*;
pub use models::*;
pub use operations::*;
pub use types::*;
