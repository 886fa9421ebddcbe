//! `POST /v1/extract`: structured extraction
//! against a named JSON Schema, with optional one-shot repair.

use axum::extract::{Extension, State};
use axum::Json;
use infergate_gateway::ExtractParams;

use super::dto::{ExtractRequest, ExtractResponse};
use super::generate::request_context;
use super::AppState;
use crate::auth::AuthContext;
use crate::error::{AppJson, IntoServerError, ServerError};
use crate::request_id::RequestId;

#[utoipa::path(
        post,
        path = "/v1/extract",
        tag = "Extract",
        summary = "Extract structured data from text against a named schema",
        security(("api_key" = [])),
        request_body = ExtractRequest,
        responses(
            (status = 200, description = "Schema-validated extraction result", body = ExtractResponse),
            (status = 404, description = "Unknown schema id"),
            (status = 422, description = "Generation output never satisfied the schema"),
        )
)]
pub async fn extract(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    auth: Option<Extension<AuthContext>>,
    AppJson(body): AppJson<ExtractRequest>,
) -> Result<Json<ExtractResponse>, ServerError> {
    let ctx = request_context(&request_id, auth.as_ref().map(|Extension(ctx)| ctx));
    let request_id = ctx.request_id.clone();
    let params = ExtractParams {
        schema_id: body.schema_id,
        text: body.text,
        model: body.model,
        cache: body.cache,
        repair: body.repair,
        max_new_tokens: body.max_new_tokens,
        temperature: body.temperature,
    };
    let result = state.gateway.extract(&ctx, &params).await;
    state.metrics.record_request(result.is_err());
    let outcome = result.map_err(|e| e.with_request(request_id))?;
    Ok(Json(ExtractResponse {
                schema_id: outcome.schema_id,
                data: outcome.data,
                model: outcome.model,
                repair_attempted: outcome.repair_attempted,
                latency_ms: outcome.latency_ms,
    }))
}
