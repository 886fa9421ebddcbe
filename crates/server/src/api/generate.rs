//! `POST /v1/generate` and `POST /v1/generate/batch`.

use axum::extract::{Extension, State};
use axum::Json;
use infergate_gateway::{GenerateParams, RequestContext};

use super::dto::{BatchItemResponse, GenerateBatchRequest, GenerateBatchResponse, GenerateRequest, GenerateResponse};
use super::AppState;
use crate::auth::AuthContext;
use crate::error::{AppJson, IntoServerError, ServerError};
use crate::request_id::RequestId;

pub(super) fn request_context(
    request_id: &RequestId,
    auth: Option<&AuthContext>,
) -> RequestContext {
    RequestContext {
        request_id: request_id.0.clone(),
        api_key_hash: auth.map(|ctx| ctx.api_key_hash.clone()).unwrap_or_default(),
    }
}

#[utoipa::path(
        post,
        path = "/v1/generate",
        tag = "Generate",
        summary = "Generate one completion",
        security(("api_key" = [])),
        request_body = GenerateRequest,
        responses(
            (status = 200, description = "Generated completion", body = GenerateResponse),
            (status = 402, description = "Quota exhausted"),
            (status = 429, description = "Rate limited"),
        )
)]
pub async fn generate(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    auth: Option<Extension<AuthContext>>,
    AppJson(body): AppJson<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ServerError> {
    let ctx = request_context(&request_id, auth.as_ref().map(|Extension(ctx)| ctx));
    let request_id = ctx.request_id.clone();
    let params = GenerateParams {
        prompt: body.prompt,
        max_new_tokens: body.max_new_tokens,
        temperature: body.temperature,
        model: body.model,
        cache: body.cache,
    };
    let result = state.gateway.generate(&ctx, &params).await;
    state.metrics.record_request(result.is_err());
    let outcome = result.map_err(|e| e.with_request(request_id))?;
    state.metrics.record_cache(outcome.cached);
    Ok(Json(GenerateResponse {
                output: outcome.output,
                model: outcome.model,
                cached: outcome.cached,
                latency_ms: outcome.latency_ms,
    }))
}

#[utoipa::path(
        post,
        path = "/v1/generate/batch",
        tag = "Generate",
        summary = "Generate a batch of completions",
        security(("api_key" = [])),
        request_body = GenerateBatchRequest,
        responses(
            (status = 200, description = "Per-item outcomes; per-item failures do not fail the batch", body = GenerateBatchResponse),
            (status = 402, description = "Quota exhausted"),
            (status = 429, description = "Rate limited"),
        )
)]
pub async fn generate_batch(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    auth: Option<Extension<AuthContext>>,
    AppJson(body): AppJson<GenerateBatchRequest>,
) -> Result<Json<GenerateBatchResponse>, ServerError> {
    let ctx = request_context(&request_id, auth.as_ref().map(|Extension(ctx)| ctx));
    let request_id = ctx.request_id.clone();
    let items: Vec<GenerateParams> = body
        .prompts
        .into_iter()
        .map(|prompt| GenerateParams {
            prompt,
            max_new_tokens: body.max_new_tokens,
            temperature: body.temperature,
            model: body.model.clone(),
            cache: body.cache,
    })
        .collect();

    let result = state
        .gateway
        .generate_batch(&ctx, body.model.as_deref(), &items)
        .await;
    state.metrics.record_request(result.is_err());
    let outcomes = result.map_err(|e| e.with_request(request_id))?;

    let results = outcomes
        .into_iter()
        .map(|o| {
            state.metrics.record_cache(o.cached);
            BatchItemResponse {
                output: o.output,
                cached: o.cached,
                error_code: o.error.map(|e| e.code().to_owned()),
            }
    })
        .collect();
    Ok(Json(GenerateBatchResponse { results }))
}
