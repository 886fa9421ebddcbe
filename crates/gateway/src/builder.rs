//! Fluent assembly of a [`Gateway`] from its constituent components. Each
//! component is built independently by the server's startup code (database
//! pools, registries, caches); the builder's job is only to make "which
//! fields are required" explicit and fail fast if one is missing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use infergate_core::{GatewayError, ModelsConfig};
use infergate_db::{CompletionCacheStore, InferenceLogStore, QuotaLedger};
use infergate_model::ModelRegistry;
use infergate_schema::SchemaRegistry;
use infergate_state::StateStore;

use crate::cache::CompletionCache;
use crate::concurrency::ConcurrencyGate;
use crate::extract::ExtractionEngine;
use crate::gateway::Gateway;
use crate::policy::PolicySnapshotLoader;

/// Builds a [`Gateway`]. All setters are required except
/// [`GatewayBuilder::fast_cache`] and [`GatewayBuilder::require_model_ready`] (defaults to `false`).
pub struct GatewayBuilder {
    models_config: Option<Arc<ModelsConfig>>,
    model_registry: Option<Arc<ModelRegistry>>,
    schemas: Option<Arc<SchemaRegistry>>,
    policy: Option<Arc<PolicySnapshotLoader>>,
    durable_cache: Option<Arc<CompletionCacheStore>>,
    fast_cache: Option<Arc<dyn StateStore>>,
    fast_cache_ttl: Option<Duration>,
    concurrency: Option<Arc<ConcurrencyGate>>,
    quota: Option<Arc<QuotaLedger>>,
    logs: Option<Arc<InferenceLogStore>>,
    deployment_capabilities: HashMap<String, bool>,
    require_model_ready: bool,
}

impl GatewayBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            models_config: None,
            model_registry: None,
            schemas: None,
            policy: None,
            durable_cache: None,
            fast_cache: None,
            fast_cache_ttl: None,
            concurrency: None,
            quota: None,
            logs: None,
            deployment_capabilities: HashMap::new(),
            require_model_ready: false,
        }
    }

    #[must_use]
    pub fn models_config(mut self, config: Arc<ModelsConfig>) -> Self {
        self.models_config = Some(config);
        self
    }

    #[must_use]
    pub fn model_registry(mut self, registry: Arc<ModelRegistry>) -> Self {
        self.model_registry = Some(registry);
        self
    }

    #[must_use]
    pub fn schemas(mut self, schemas: Arc<SchemaRegistry>) -> Self {
        self.schemas = Some(schemas);
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: Arc<PolicySnapshotLoader>) -> Self {
        self.policy = Some(policy);
        self
    }

    #[must_use]
    pub fn durable_cache(mut self, store: Arc<CompletionCacheStore>) -> Self {
        self.durable_cache = Some(store);
        self
    }

    /// Set the optional fast cache tier and its TTL. If never called, the
    /// Completion Cache falls straight through to the durable tier.
    #[must_use]
    pub fn fast_cache(mut self, store: Arc<dyn StateStore>, ttl: Option<Duration>) -> Self {
        self.fast_cache = Some(store);
        self.fast_cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn concurrency(mut self, gate: Arc<ConcurrencyGate>) -> Self {
        self.concurrency = Some(gate);
        self
    }

    #[must_use]
    pub fn quota(mut self, ledger: Arc<QuotaLedger>) -> Self {
        self.quota = Some(ledger);
        self
    }

    #[must_use]
    pub fn logs(mut self, store: Arc<InferenceLogStore>) -> Self {
        self.logs = Some(store);
        self
    }

    #[must_use]
    pub fn deployment_capabilities(mut self, capabilities: HashMap<String, bool>) -> Self {
        self.deployment_capabilities = capabilities;
        self
    }

    #[must_use]
    pub fn require_model_ready(mut self, required: bool) -> Self {
        self.require_model_ready = required;
        self
    }

    /// Consume the builder and produce a configured [`Gateway`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] naming the first required field
    /// left unset.
    pub fn build(self) -> Result<Gateway, GatewayError> {
        let models_config = required(self.models_config, "models_config")?;
        let model_registry = required(self.model_registry, "model_registry")?;
        let schemas = required(self.schemas, "schemas")?;
        let policy = required(self.policy, "policy")?;
        let durable_cache = required(self.durable_cache, "durable_cache")?;
        let concurrency = required(self.concurrency, "concurrency")?;
        let quota = required(self.quota, "quota")?;
        let logs = required(self.logs, "logs")?;

        let cache = Arc::new(CompletionCache::new(
                self.fast_cache,
                self.fast_cache_ttl,
                durable_cache,
        ));
        let extraction = Arc::new(ExtractionEngine::new(Arc::clone(&schemas)));

        Ok(Gateway {
                models_config,
                model_registry,
                schemas,
                policy,
                cache,
                concurrency,
                quota,
                logs,
                extraction,
                deployment_capabilities: self.deployment_capabilities,
                require_model_ready: self.require_model_ready,
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, GatewayError> {
    value.ok_or_else(|| GatewayError::Internal(format!("gateway builder: '{field}' is required")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_missing_required_field_returns_error() {
        let err = GatewayBuilder::new().build().unwrap_err();
        assert_eq!(err.code(), "internal_error");
        assert!(err.to_string().contains("models_config"));
    }
}
