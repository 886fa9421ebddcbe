//! The Gateway: composes the Capability Resolver, Policy Snapshot
//! Loader, Completion Cache, Quota Ledger, Concurrency Gate, Model Registry
//! and Extraction Engine into the request pipeline. Owns admission steps 3
//! through 8; authentication and rate-limiting happen in `infergate-server`
//! before a request reaches these methods.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use infergate_core::{Fingerprint, GatewayError, InferenceLog, ModelsConfig, Route};
use infergate_db::{InferenceLogStore, QuotaLedger};
use infergate_model::{GenerationParams, ModelBackend, ModelError, ModelRegistry};
use infergate_schema::SchemaRegistry;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::cache::CompletionCache;
use crate::capability::CapabilityResolver;
use crate::concurrency::ConcurrencyGate;
use crate::extract::{ExtractionEngine, ExtractionFailure, ExtractionOutcome, FailureStage};
use crate::policy::PolicySnapshotLoader;

/// Per-request identity carried through the pipeline: who is calling and
/// what to correlate logs/traces by. Populated by the server after
/// authentication succeeds (step 1).
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub api_key_hash: String,
}

/// Inputs to a single `/v1/generate` (or one item of `/v1/generate/batch`)
/// call, independent of HTTP framing.
#[derive(Debug, Clone, Default)]
pub struct GenerateParams {
    pub prompt: String,
    pub max_new_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub model: Option<String>,
    pub cache: bool,
}

/// The outcome of one successful generate call.
#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    pub output: String,
    pub model: String,
    pub cached: bool,
    pub latency_ms: i64,
}

/// One item's outcome within a `/v1/generate/batch` response. Unlike the
/// single-item route, a per-item failure does not abort the request or the
/// batch's own InferenceLog row.
#[derive(Debug)]
pub struct BatchItemOutcome {
    pub output: Option<String>,
    pub cached: bool,
    pub error: Option<GatewayError>,
}

/// Inputs to a single `/v1/extract` call.
#[derive(Debug, Clone, Default)]
pub struct ExtractParams {
    pub schema_id: String,
    pub text: String,
    pub model: Option<String>,
    pub cache: bool,
    pub repair: bool,
    pub max_new_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

/// The outcome of one successful extraction.
#[derive(Debug, Clone)]
pub struct ExtractOutcome {
    pub schema_id: String,
    pub data: Value,
    pub model: String,
    pub repair_attempted: bool,
    pub latency_ms: i64,
}

/// Summary of one configured model for `GET /v1/models`:
/// merged capabilities reflect the same computation the live request path
/// uses (deployment AND model AND policy).
#[derive(Debug, Clone)]
pub struct ModelSummary {
    pub model_id: String,
    pub loaded: bool,
    pub capabilities: HashMap<String, bool>,
}

/// Aggregate readiness used by `/readyz` and `/modelz`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Readiness {
    pub database_ok: bool,
    pub model_ready: bool,
}

/// The assembled request-processing core. Built once at startup via
/// [`crate::builder::GatewayBuilder`] and shared behind an `Arc` by every
/// HTTP handler.
pub struct Gateway {
    pub(crate) models_config: Arc<ModelsConfig>,
    pub(crate) model_registry: Arc<ModelRegistry>,
    pub(crate) schemas: Arc<SchemaRegistry>,
    pub(crate) policy: Arc<PolicySnapshotLoader>,
    pub(crate) cache: Arc<CompletionCache>,
    pub(crate) concurrency: Arc<ConcurrencyGate>,
    pub(crate) quota: Arc<QuotaLedger>,
    pub(crate) logs: Arc<InferenceLogStore>,
    pub(crate) extraction: Arc<ExtractionEngine>,
    pub(crate) deployment_capabilities: HashMap<String, bool>,
    pub(crate) require_model_ready: bool,
}

impl Gateway {
    #[must_use]
    pub fn models_config(&self) -> &ModelsConfig {
        &self.models_config
    }

    #[must_use]
    pub fn model_registry(&self) -> &ModelRegistry {
        &self.model_registry
    }

    #[must_use]
    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    #[must_use]
    pub fn policy(&self) -> &PolicySnapshotLoader {
        &self.policy
    }

    /// Administrative model load, used by `POST /v1/admin/models/load`
    /// (role check happens in the server before this is called).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ModelNotLoaded`] if `model_id` is unknown.
    pub async fn admin_load_model(&self, model_id: &str) -> Result<(), GatewayError> {
        self.model_registry
            .admin_load(model_id)
            .await
            .map_err(map_model_error)
    }

    /// The merged capability map for every configured model, for
    /// `GET /v1/models`.
    #[must_use]
    pub fn list_models(&self) -> Vec<ModelSummary> {
        let policy = self.policy.current();
        self.models_config
            .models
            .iter()
            .map(|spec| {
                let merged = self.models_config.merged_capabilities(&spec.id);
                ModelSummary {
                    model_id: spec.id.clone(),
                    loaded: self.model_registry.is_loaded(&spec.id),
                    capabilities: CapabilityResolver::merged(&merged, Some(&policy), &spec.id),
                }
        })
            .collect()
    }

    #[must_use]
    pub fn deployment_capabilities(&self) -> &HashMap<String, bool> {
        &self.deployment_capabilities
    }

    /// Whether at least one model is loaded, gated by `require_model_ready`.
    #[must_use]
    pub fn model_ready(&self) -> bool {
        !self.require_model_ready || self.model_registry.any_loaded()
    }

    /// Run admission steps 3-7 and produce one generate outcome, then
    /// persist exactly one InferenceLog row (step 8) regardless of outcome.
    ///
    /// # Errors
    ///
    /// Any [`GatewayError`] surfaced by capability, quota, model binding, or
    /// backend execution.
    #[instrument(name = "gateway.generate", skip(self, params), fields(request_id = %ctx.request_id))]
    pub async fn generate(
        &self,
        ctx: &RequestContext,
        params: &GenerateParams,
    ) -> Result<GenerateOutcome, GatewayError> {
        let started = Instant::now();
        let model_id = self.resolve_model_id(params.model.as_deref());
        let result = self.generate_inner(ctx, params, &model_id).await;
        let latency_ms = elapsed_ms(started);

        let (status_code, error_code, completion_tokens, cached) = match &result {
            Ok(outcome) => (
                200,
                None,
                Some(word_count(&outcome.output)),
                outcome.cached,
            ),
            Err(e) => (e.status_code(), Some(e.code().to_owned()), None, false),
        };
        self.persist_log(
            ctx,
            Route::Generate,
            &model_id,
            Some(word_count(&params.prompt)),
            completion_tokens,
            latency_ms,
            status_code,
            error_code,
            cached,
        )
            .await;
        result.map(|outcome| GenerateOutcome {
                latency_ms,
                ..outcome
        })
    }

    async fn generate_inner(
        &self,
        ctx: &RequestContext,
        params: &GenerateParams,
        model_id: &str,
    ) -> Result<GenerateOutcome, GatewayError> {
        self.check_capability("generate", model_id)?;
        self.consume_quota(&ctx.api_key_hash).await?;
        let _permit = self.concurrency.acquire(&ctx.request_id, "/v1/generate").await;
        let backend = self.bind_model(model_id).await?;

        let gen_params = GenerationParams {
            max_new_tokens: params.max_new_tokens,
            temperature: params.temperature,
        };

        if params.cache {
            let fingerprint = Fingerprint::compute(
                model_id,
                &params.prompt,
                params.max_new_tokens,
                params.temperature,
                &[],
            );
            let prompt = params.prompt.clone();
            let value = self
                .cache
                .get_or_generate(&fingerprint, || async move {
                    backend
                        .generate(&prompt, &gen_params)
                        .await
                        .map_err(map_model_error)
            })
                .await?;
            Ok(GenerateOutcome {
                    output: value.value,
                    model: model_id.to_owned(),
                    cached: value.cached,
                    latency_ms: 0,
            })
        } else {
            let output = backend
                .generate(&params.prompt, &gen_params)
                .await
                .map_err(map_model_error)?;
            Ok(GenerateOutcome {
                    output,
                    model: model_id.to_owned(),
                    cached: false,
                    latency_ms: 0,
            })
        }
    }

    /// Batch variant: admission (capability, quota, concurrency, model
    /// bind) happens once for the whole request; each prompt is then
    /// generated independently so one item's failure never poisons another.
    /// One InferenceLog row is written for the batch as a whole.
    ///
    /// # Errors
    ///
    /// Only admission failures (capability, quota, model bind) are
    /// returned as `Err`; per-item backend/cache failures are reported
    /// inline in each [`BatchItemOutcome`].
    #[instrument(name = "gateway.generate_batch", skip(self, items), fields(request_id = %ctx.request_id))]
    pub async fn generate_batch(
        &self,
        ctx: &RequestContext,
        model: Option<&str>,
        items: &[GenerateParams],
    ) -> Result<Vec<BatchItemOutcome>, GatewayError> {
        let started = Instant::now();
        let model_id = self.resolve_model_id(model);
        let result = self.generate_batch_inner(ctx, &model_id, items).await;
        let latency_ms = elapsed_ms(started);

        let prompt_tokens = Some(items.iter().map(|i| word_count(&i.prompt)).sum());
        let (status_code, error_code, completion_tokens, cached) = match &result {
            Ok(outcomes) => {
                let completion_tokens = outcomes
                    .iter()
                    .filter_map(|o| o.output.as_deref().map(word_count))
                    .sum();
                let all_cached = !outcomes.is_empty() && outcomes.iter().all(|o| o.cached);
                (200, None, Some(completion_tokens), all_cached)
            }
            Err(e) => (e.status_code(), Some(e.code().to_owned()), None, false),
        };
        self.persist_log(
            ctx,
            Route::GenerateBatch,
            &model_id,
            prompt_tokens,
            completion_tokens,
            latency_ms,
            status_code,
            error_code,
            cached,
        )
            .await;
        result
    }

    async fn generate_batch_inner(
        &self,
        ctx: &RequestContext,
        model_id: &str,
        items: &[GenerateParams],
    ) -> Result<Vec<BatchItemOutcome>, GatewayError> {
        self.check_capability("generate", model_id)?;
        self.consume_quota(&ctx.api_key_hash).await?;
        let _permit = self
            .concurrency
            .acquire(&ctx.request_id, "/v1/generate/batch")
            .await;
        let backend = self.bind_model(model_id).await?;

        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            let gen_params = GenerationParams {
                max_new_tokens: item.max_new_tokens,
                temperature: item.temperature,
            };
            let outcome = if item.cache {
                let fingerprint = Fingerprint::compute(
                    model_id,
                    &item.prompt,
                    item.max_new_tokens,
                    item.temperature,
                    &[],
                );
                let backend = Arc::clone(&backend);
                let prompt = item.prompt.clone();
                match self
                    .cache
                    .get_or_generate(&fingerprint, || async move {
                        backend
                            .generate(&prompt, &gen_params)
                            .await
                            .map_err(map_model_error)
                })
                    .await
                {
                    Ok(value) => BatchItemOutcome {
                        output: Some(value.value),
                        cached: value.cached,
                        error: None,
                    },
                    Err(e) => BatchItemOutcome {
                        output: None,
                        cached: false,
                        error: Some(e),
                    },
                }
            } else {
                match backend.generate(&item.prompt, &gen_params).await {
                    Ok(output) => BatchItemOutcome {
                        output: Some(output),
                        cached: false,
                        error: None,
                    },
                    Err(e) => BatchItemOutcome {
                        output: None,
                        cached: false,
                        error: Some(map_model_error(e)),
                    },
                }
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Run the Extraction Engine for one `/v1/extract` request.
    ///
    /// # Errors
    ///
    /// Capability/quota/model-bind admission errors, or an
    /// [`ExtractionFailure`]'s [`GatewayError`] once the engine exhausts
    /// generate/repair.
    #[instrument(name = "gateway.extract", skip(self, params), fields(request_id = %ctx.request_id))]
    pub async fn extract(
        &self,
        ctx: &RequestContext,
        params: &ExtractParams,
    ) -> Result<ExtractOutcome, GatewayError> {
        let started = Instant::now();
        let model_id = self.resolve_model_id(params.model.as_deref());
        let result = self.extract_inner(ctx, params, &model_id).await;
        let latency_ms = elapsed_ms(started);

        let (status_code, error_code, completion_tokens) = match &result {
            Ok(outcome) => (200, None, Some(word_count(&outcome.data.to_string()))),
            Err(e) => (e.status_code(), Some(e.code().to_owned()), None),
        };
        self.persist_log(
            ctx,
            Route::Extract,
            &model_id,
            Some(word_count(&params.text)),
            completion_tokens,
            latency_ms,
            status_code,
            error_code,
            false,
        )
            .await;
        result.map(|outcome| ExtractOutcome {
                latency_ms,
                ..outcome
        })
    }

    async fn extract_inner(
        &self,
        ctx: &RequestContext,
        params: &ExtractParams,
        model_id: &str,
    ) -> Result<ExtractOutcome, GatewayError> {
        self.check_capability("extract", model_id)?;
        self.consume_quota(&ctx.api_key_hash).await?;
        let _permit = self.concurrency.acquire(&ctx.request_id, "/v1/extract").await;
        let backend = self.bind_model(model_id).await?;

        let gen_params = GenerationParams {
            max_new_tokens: params.max_new_tokens,
            temperature: params.temperature,
        };

        let outcome: Result<ExtractionOutcome, ExtractionFailure> = self
            .extraction
            .run(&params.schema_id, &params.text, params.repair, |prompt| {
                let backend = Arc::clone(&backend);
                let gen_params = gen_params;
                async move {
                    backend
                        .generate(&prompt, &gen_params)
                        .await
                        .map_err(map_model_error)
                }
        })
            .await;

        match outcome {
            Ok(outcome) => Ok(ExtractOutcome {
                    schema_id: params.schema_id.clone(),
                    data: outcome.data,
                    model: model_id.to_owned(),
                    repair_attempted: outcome.repair_attempted,
                    latency_ms: 0,
            }),
            Err(failure) => {
                log_extraction_failure(&ctx.request_id, failure.stage, &failure.error);
                Err(failure.error)
            }
        }
    }

    /// Liveness of dependencies used by `/readyz`: a lightweight count
    /// query against the inference-log table doubles as a database
    /// reachability probe.
    pub async fn readiness(&self) -> Readiness {
        let database_ok = self.logs.count_for_key("__readyz_probe__").await.is_ok();
        Readiness {
            database_ok,
            model_ready: self.model_ready(),
        }
    }

    fn resolve_model_id(&self, requested: Option<&str>) -> String {
        requested
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| self.model_registry.default_model_id().to_owned())
    }

    fn check_capability(&self, capability: &str, model_id: &str) -> Result<(), GatewayError> {
        let snapshot = self.policy.current();
        let model_capabilities = self.models_config.merged_capabilities(model_id);
        CapabilityResolver::check(
            capability,
            &self.deployment_capabilities,
            &model_capabilities,
            Some(&snapshot),
            model_id,
        )
    }

    async fn consume_quota(&self, api_key_hash: &str) -> Result<(), GatewayError> {
        match self.quota.check_and_consume(api_key_hash).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(GatewayError::QuotaExhausted),
            Err(e) => {
                warn!(error = %e, "quota ledger transaction failed");
                Err(GatewayError::Internal(format!("quota check failed: {e}")))
            }
        }
    }

    async fn bind_model(&self, model_id: &str) -> Result<Arc<dyn ModelBackend>, GatewayError> {
        self.model_registry
            .bind(Some(model_id))
            .await
            .map_err(map_model_error)
    }

    #[allow(clippy::too_many_arguments)]
    async fn persist_log(
        &self,
        ctx: &RequestContext,
        route: Route,
        model_id: &str,
        prompt_tokens: Option<i64>,
        completion_tokens: Option<i64>,
        latency_ms: i64,
        status_code: u16,
        error_code: Option<String>,
        cached: bool,
    ) {
        let log = InferenceLog::new(
            ctx.request_id.clone(),
            ctx.api_key_hash.clone(),
            route,
            model_id,
            prompt_tokens,
            completion_tokens,
            latency_ms,
            status_code,
            error_code,
            cached,
        );
        if let Err(e) = self.logs.insert(&log).await {
            warn!(error = %e, request_id = %ctx.request_id, "failed to persist inference log");
        }
    }
}

fn log_extraction_failure(request_id: &str, stage: FailureStage, error: &GatewayError) {
    warn!(
        request_id,
        stage = stage.as_str(),
        code = error.code(),
        "extraction attempt failed"
    );
}

/// Word count is an approximation of token count: real tokenization is an
/// external collaborator, so logs only need a
/// stable, cheap proxy for relative sizing.
fn word_count(s: &str) -> i64 {
    i64::try_from(s.split_whitespace().count()).unwrap_or(i64::MAX)
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}

fn map_model_error(e: ModelError) -> GatewayError {
    match e {
        ModelError::NotLoaded(model_id) | ModelError::Unknown(model_id) => {
            GatewayError::ModelNotLoaded { model_id }
        }
        ModelError::Backend(reason) => GatewayError::Internal(format!("backend error: {reason}")),
        ModelError::Timeout(secs) => {
            GatewayError::Internal(format!("backend timed out after {secs}s"))
        }
        ModelError::Configuration(reason) => {
            GatewayError::Internal(format!("backend misconfigured: {reason}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_count_counts_whitespace_tokens() {
        assert_eq!(word_count("hello world"), 2);
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count(" one "), 1);
    }

    #[test]
    fn unknown_and_not_loaded_model_errors_both_map_to_model_not_loaded() {
        let a = map_model_error(ModelError::Unknown("m1".into()));
        let b = map_model_error(ModelError::NotLoaded("m1".into()));
        assert_eq!(a.code(), "model_not_loaded");
        assert_eq!(b.code(), "model_not_loaded");
    }
}
