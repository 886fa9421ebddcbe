pub mod error;
pub mod registry;

pub use error::SchemaError;
pub use registry::{SchemaInfo, SchemaRegistry};
