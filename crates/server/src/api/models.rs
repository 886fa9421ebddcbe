//! `GET /v1/models`: merged capabilities per configured model.

use axum::extract::State;
use axum::Json;

use super::dto::{ModelSummaryResponse, ModelsResponse};
use super::AppState;

#[utoipa::path(
        get,
        path = "/v1/models",
        tag = "Models",
        summary = "List configured models",
        security(("api_key" = [])),
        responses((status = 200, description = "Model capability summary", body = ModelsResponse))
)]
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let models = state
        .gateway
        .list_models()
        .into_iter()
        .map(|m| ModelSummaryResponse {
            model_id: m.model_id,
            loaded: m.loaded,
            capabilities: m.capabilities,
    })
        .collect();
    Json(ModelsResponse {
            models,
            deployment_capabilities: state.gateway.deployment_capabilities().clone(),
    })
}
