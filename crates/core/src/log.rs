use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The public endpoint a log row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Generate,
    GenerateBatch,
    Extract,
}

impl Route {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::GenerateBatch => "generate_batch",
            Self::Extract => "extract",
        }
    }
}

/// One append-only record of a terminal request outcome.
/// Written exactly once per request that reaches a terminal status,
/// including errors and capability denials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct InferenceLog {
    pub id: Uuid,
    pub request_id: String,
    /// SHA-256 hash of the caller's API key, never the raw secret.
    pub api_key_ref: String,
    pub route: Route,
    pub model_id: String,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub latency_ms: i64,
    pub status_code: u16,
    pub error_code: Option<String>,
    pub cached: bool,
    pub created_at: DateTime<Utc>,
}

impl InferenceLog {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        api_key_ref: impl Into<String>,
        route: Route,
        model_id: impl Into<String>,
        prompt_tokens: Option<i64>,
        completion_tokens: Option<i64>,
        latency_ms: i64,
        status_code: u16,
        error_code: Option<String>,
        cached: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id: request_id.into(),
            api_key_ref: api_key_ref.into(),
            route,
            model_id: model_id.into(),
            prompt_tokens,
            completion_tokens,
            latency_ms,
            status_code,
            error_code,
            cached,
            created_at: Utc::now(),
        }
    }
}
