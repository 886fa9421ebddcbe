pub mod builder;
pub mod cache;
pub mod capability;
pub mod concurrency;
pub mod extract;
pub mod gateway;
pub mod metrics;
pub mod policy;

pub use builder::GatewayBuilder;
pub use cache::{CachedValue, CompletionCache};
pub use capability::CapabilityResolver;
pub use concurrency::{ConcurrencyGate, ConcurrencyPermit};
pub use extract::{ExtractionEngine, ExtractionFailure, ExtractionOutcome, FailureStage};
pub use gateway::{
    BatchItemOutcome, ExtractOutcome, ExtractParams, Gateway, GenerateOutcome, GenerateParams,
    ModelSummary, Readiness, RequestContext,
};
pub use metrics::GatewayMetrics;
pub use policy::{PolicyFileWatch, PolicySnapshotLoader};
