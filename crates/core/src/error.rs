use serde_json::Value;
use thiserror::Error;

/// Errors that can terminate a request anywhere in the admission pipeline or
/// the extraction state machine.
///
/// Every variant carries its own stable `code` and HTTP status (see
/// [`GatewayError::code`] / [`GatewayError::status_code`]); the HTTP-framing
/// crate only needs to turn this into an envelope, never to guess a status.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("missing X-API-Key header")]
    MissingApiKey,

    #[error("API key is not recognized or inactive")]
    InvalidApiKey,

    #[error("rate limit exceeded, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("monthly quota exhausted")]
    QuotaExhausted,

    #[error("capability '{capability}' disabled at deployment level")]
    CapabilityDisabled { capability: String },

    #[error("capability '{capability}' not supported")]
    CapabilityNotSupported {
        capability: String,
        model_capabilities: Value,
    },

    #[error("schema '{schema_id}' not found")]
    SchemaNotFound { schema_id: String },

    #[error("schema '{schema_id}' failed to load: {reason}")]
    SchemaLoadFailed { schema_id: String, reason: String },

    #[error("no valid JSON object found: {reason}")]
    InvalidJson { reason: String },

    #[error("schema validation failed")]
    SchemaValidationFailed { errors: Value },

    #[error("model '{model_id}' is not loaded")]
    ModelNotLoaded { model_id: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Stable machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "missing_api_key",
            Self::InvalidApiKey => "invalid_api_key",
            Self::RateLimited { .. } => "rate_limited",
            Self::QuotaExhausted => "quota_exhausted",
            Self::CapabilityDisabled { .. } => "capability_disabled",
            Self::CapabilityNotSupported { .. } => "capability_not_supported",
            Self::SchemaNotFound { .. } => "schema_not_found",
            Self::SchemaLoadFailed { .. } => "schema_load_failed",
            Self::InvalidJson { .. } => "invalid_json",
            Self::SchemaValidationFailed { .. } => "schema_validation_failed",
            Self::ModelNotLoaded { .. } => "model_not_loaded",
            Self::Internal(_) => "internal_error",
        }
    }

    /// HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingApiKey | Self::InvalidApiKey => 401,
            Self::QuotaExhausted => 402,
            Self::CapabilityNotSupported { .. } => 400,
            Self::SchemaNotFound { .. } => 404,
            Self::InvalidJson { .. } | Self::SchemaValidationFailed { .. } => 422,
            Self::RateLimited { .. } => 429,
            Self::CapabilityDisabled { .. } => 501,
            Self::ModelNotLoaded { .. } => 503,
            Self::SchemaLoadFailed { .. } | Self::Internal(_) => 500,
        }
    }

    /// The `extra` object carried in the error envelope, if any.
    #[must_use]
    pub fn extra(&self) -> Option<Value> {
        match self {
            Self::RateLimited { retry_after } => {
                Some(serde_json::json!({ "retry_after": retry_after }))
            }
            Self::CapabilityNotSupported {
                model_capabilities, ..
            } => Some(serde_json::json!({ "model_capabilities": model_capabilities })),
            Self::SchemaValidationFailed { errors } => {
                Some(serde_json::json!({ "errors": errors }))
            }
            _ => None,
        }
    }
}
