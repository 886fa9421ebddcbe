//! Request/response bodies for the HTTP surface. Kept separate
//! from the gateway's own params/outcome types so the wire format can evolve
//! independently of the pipeline's internal shapes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn default_cache() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub max_new_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_cache")]
    pub cache: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GenerateResponse {
    pub output: String,
    pub model: String,
    pub cached: bool,
    pub latency_ms: i64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GenerateBatchRequest {
    pub prompts: Vec<String>,
    #[serde(default)]
    pub max_new_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_cache")]
    pub cache: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchItemResponse {
    pub output: Option<String>,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GenerateBatchResponse {
    pub results: Vec<BatchItemResponse>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ExtractRequest {
    pub schema_id: String,
    pub text: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_cache")]
    pub cache: bool,
    #[serde(default)]
    pub repair: bool,
    #[serde(default)]
    pub max_new_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExtractResponse {
    pub schema_id: String,
    pub data: serde_json::Value,
    pub model: String,
    pub repair_attempted: bool,
    pub latency_ms: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ModelSummaryResponse {
    pub model_id: String,
    pub loaded: bool,
    pub capabilities: HashMap<String, bool>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ModelsResponse {
    pub models: Vec<ModelSummaryResponse>,
    pub deployment_capabilities: HashMap<String, bool>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReadyResponse {
    pub ready: bool,
    pub database_ok: bool,
    pub model_ready: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ModelzResponse {
    pub ready: bool,
    pub model_ready: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AdminLoadModelRequest {
    pub model_id: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminLoadModelResponse {
    pub model_id: String,
    pub loaded: bool,
}
