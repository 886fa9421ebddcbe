pub mod backend;
pub mod config;
pub mod error;
pub mod http;
pub mod mock;
pub mod registry;

pub use backend::{GenerationParams, ModelBackend};
pub use config::HttpBackendConfig;
pub use error::ModelError;
pub use http::HttpModelBackend;
pub use mock::{FailingModelBackend, MockModelBackend};
pub use registry::ModelRegistry;
