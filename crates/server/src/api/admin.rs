//! `POST /v1/admin/models/load`: admin-only override to
//! bring an `off`-mode model into the loaded state. Gated by
//! [`crate::auth::require_admin_role`] ahead of this handler.

use axum::extract::{Extension, State};
use axum::Json;

use super::dto::{AdminLoadModelRequest, AdminLoadModelResponse};
use super::AppState;
use crate::error::{AppJson, IntoServerError, ServerError};
use crate::request_id::RequestId;

#[utoipa::path(
        post,
        path = "/v1/admin/models/load",
        tag = "Admin",
        summary = "Force-load a model",
        security(("api_key" = [])),
        request_body = AdminLoadModelRequest,
        responses(
            (status = 200, description = "Model is now loaded", body = AdminLoadModelResponse),
            (status = 401, description = "Caller is not an admin"),
            (status = 503, description = "Unknown model id"),
        )
)]
pub async fn load_model(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    AppJson(body): AppJson<AdminLoadModelRequest>,
) -> Result<Json<AdminLoadModelResponse>, ServerError> {
    let request_id = request_id.0;
    state
        .gateway
        .admin_load_model(&body.model_id)
        .await
        .map_err(|e| e.with_request(request_id))?;
    Ok(Json(AdminLoadModelResponse {
                loaded: state.gateway.model_registry().is_loaded(&body.model_id),
                model_id: body.model_id,
    }))
}
