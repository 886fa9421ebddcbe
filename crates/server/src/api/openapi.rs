use infergate_schema::SchemaInfo;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::Modify;

use super::dto::{
    AdminLoadModelRequest, AdminLoadModelResponse, BatchItemResponse, ExtractRequest,
    ExtractResponse, GenerateBatchRequest, GenerateBatchResponse, GenerateRequest,
    GenerateResponse, HealthResponse, ModelSummaryResponse, ModelsResponse, ModelzResponse,
    ReadyResponse,
};
use crate::error::ErrorEnvelope;

struct ApiKeySecurity;

impl Modify for ApiKeySecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
        }
    }
}

#[derive(utoipa::OpenApi)]
#[openapi(
    info(
        title = "Infergate API",
        version = "0.1.0",
        description = "HTTP API for the Infergate inference gateway: generate, extract, and manage model capacity behind a shared admission pipeline.",
        license(name = "MIT")
    ),
    tags(
        (name = "Health", description = "Liveness, readiness, and metrics"),
        (name = "Models", description = "Model capability listing"),
        (name = "Schemas", description = "JSON Schema registry"),
        (name = "Generate", description = "Free-form text generation"),
        (name = "Extract", description = "Schema-constrained structured extraction"),
        (name = "Admin", description = "Administrative model control"),
    ),
    paths(
        super::health::healthz,
        super::health::readyz,
        super::health::modelz,
        super::health::metrics,
        super::models::list_models,
        super::schemas::list_schemas,
        super::schemas::get_schema,
        super::generate::generate,
        super::generate::generate_batch,
        super::extract::extract,
        super::admin::load_model,
    ),
    components(schemas(
        HealthResponse, ReadyResponse, ModelzResponse,
        ModelSummaryResponse, ModelsResponse,
        SchemaInfo,
        GenerateRequest, GenerateResponse,
        GenerateBatchRequest, GenerateBatchResponse, BatchItemResponse,
        ExtractRequest, ExtractResponse,
        AdminLoadModelRequest, AdminLoadModelResponse,
        ErrorEnvelope,
    )),
    modifiers(&ApiKeySecurity)
)]
pub struct ApiDoc;
