//! `GET /v1/schemas` and `GET /v1/schemas/{schema_id}`: the
//! JSON Schema registry's read surface, backed by `infergate_schema::SchemaRegistry`.

use axum::extract::{Path, Request, State};
use axum::Json;
use infergate_core::GatewayError;
use infergate_schema::{SchemaError, SchemaInfo};
use serde_json::Value;

use super::AppState;
use crate::error::{extension_request_id, IntoServerError, ServerError};

#[utoipa::path(
        get,
        path = "/v1/schemas",
        tag = "Schemas",
        summary = "List discoverable schemas",
        security(("api_key" = [])),
        responses((status = 200, description = "Schema summaries", body = [SchemaInfo]))
)]
pub async fn list_schemas(State(state): State<AppState>) -> Json<Vec<SchemaInfo>> {
    Json(state.gateway.schemas().list())
}

#[utoipa::path(
        get,
        path = "/v1/schemas/{schema_id}",
        tag = "Schemas",
        summary = "Fetch one schema document",
        security(("api_key" = [])),
        params(("schema_id" = String, Path, description = "Schema id (filename stem)")),
        responses(
            (status = 200, description = "Raw JSON Schema document"),
            (status = 404, description = "No schema with this id"),
        )
)]
pub async fn get_schema(
    State(state): State<AppState>,
    Path(schema_id): Path<String>,
    request: Request,
) -> Result<Json<Value>, ServerError> {
    let request_id = extension_request_id(request.extensions());
    state
        .gateway
        .schemas()
        .document(&schema_id)
        .map(Json)
        .map_err(|e| map_schema_error(e).with_request(request_id))
}

fn map_schema_error(e: SchemaError) -> GatewayError {
    match e {
        SchemaError::NotFound(schema_id) => GatewayError::SchemaNotFound { schema_id },
        SchemaError::LoadFailed { schema_id, reason } => {
            GatewayError::SchemaLoadFailed { schema_id, reason }
        }
    }
}
