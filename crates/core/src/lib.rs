pub mod apikey;
pub mod cache;
pub mod error;
pub mod fingerprint;
pub mod log;
pub mod model_spec;
pub mod policy;
pub mod quota;
pub mod rate;
pub mod role;

pub use apikey::ApiKey;
pub use cache::{CacheEntry, CacheTier};
pub use error::GatewayError;
pub use fingerprint::Fingerprint;
pub use log::{InferenceLog, Route};
pub use model_spec::{LoadMode, ModelSpec, ModelsConfig};
pub use policy::{PolicyDecisionFile, PolicySnapshot};
pub use quota::QuotaCell;
pub use rate::RateCounter;
pub use role::Role;
