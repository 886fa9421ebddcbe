//! Admission steps 1 and 2: authenticate the `X-API-Key`
//! header against the `ApiKeyStore`, then rate-limit by the caller's role.
//! Implemented as one middleware because rate-limiting is keyed by the
//! identity authentication just established.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use infergate_core::{ApiKey, GatewayError, Role};

use crate::api::AppState;
use crate::error::{extension_request_id, IntoServerError, ServerError};

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub api_key_hash: String,
    pub role: Role,
}

const API_KEY_HEADER: &str = "x-api-key";

/// Admission steps 1 (authenticate) and 2 (rate-limit). On success, inserts
/// an [`AuthContext`] into the request's extensions for downstream handlers.
pub async fn authenticate_and_rate_limit(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let request_id = extension_request_id(request.extensions());

    let raw_key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty());

    let Some(raw_key) = raw_key else {
        return Err(GatewayError::MissingApiKey.with_request(request_id));
    };

    let key_hash = ApiKey::hash(raw_key);
    let api_key = state
        .api_keys
        .get_by_hash(&key_hash)
        .await
        .map_err(|_| GatewayError::InvalidApiKey.with_request(request_id.clone()))?;

    if !api_key.active {
        return Err(GatewayError::InvalidApiKey.with_request(request_id));
    }

    let role = state
        .roles
        .get_by_name(&api_key.role)
        .await
        .unwrap_or_default();

    state
        .rate_limiter
        .check_and_increment(&key_hash, role.requests_per_minute)
        .map_err(|e| e.with_request(request_id))?;

    request.extensions_mut().insert(AuthContext {
            api_key_hash: key_hash,
            role,
    });

    Ok(next.run(request).await)
}

/// Role check for `/v1/admin/*` routes, layered after [`authenticate_and_rate_limit`]
/// so an [`AuthContext`] is already present in extensions.
pub async fn require_admin_role(request: Request, next: Next) -> Result<Response, ServerError> {
    let request_id = extension_request_id(request.extensions());
    let is_admin = request
        .extensions()
        .get::<AuthContext>()
        .is_some_and(|ctx| ctx.role.is_admin());
    if !is_admin {
        return Err(GatewayError::InvalidApiKey.with_request(request_id));
    }
    Ok(next.run(request).await)
}
