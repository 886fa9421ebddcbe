//! The only place in the workspace that knows how a [`GatewayError`] becomes
//! an HTTP response: `infergate-core` and friends never import `axum`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use infergate_core::GatewayError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::request_id::request_id_of;

/// Wire shape: `{code, message, request_id, extra}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub request_id: String,
    pub extra: Option<Value>,
}

/// Wraps a [`GatewayError`] together with the axum request it failed
/// within, so the `request_id` can be read out of extensions when the
/// response is built rather than threaded through every call site.
pub struct ServerError {
    inner: GatewayError,
    request_id: String,
}

impl ServerError {
    #[must_use]
    pub fn new(inner: GatewayError, request_id: impl Into<String>) -> Self {
        Self {
            inner,
            request_id: request_id.into(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let envelope = ErrorEnvelope {
            code: self.inner.code().to_owned(),
            message: self.inner.to_string(),
            request_id: self.request_id.clone(),
            extra: self.inner.extra(),
        };
        (status, Json(envelope)).into_response()
    }
}

/// Extension trait letting handlers attach the ambient request id to a
/// [`GatewayError`] returned from a `Result` without constructing
/// [`ServerError`] by hand at every call site.
pub trait IntoServerError {
    fn with_request(self, request_id: impl Into<String>) -> ServerError;
}

impl IntoServerError for GatewayError {
    fn with_request(self, request_id: impl Into<String>) -> ServerError {
        ServerError::new(self, request_id)
    }
}

/// Rejection wrapper for malformed request bodies (`axum::Json` extractor
/// failures), which never reach application code as a [`GatewayError`].
pub struct JsonRejectionError(pub JsonRejection, pub String);

impl IntoResponse for JsonRejectionError {
    fn into_response(self) -> Response {
        let envelope = ErrorEnvelope {
            code: "invalid_json".to_owned(),
            message: self.0.body_text(),
            request_id: self.1,
            extra: None,
        };
        (StatusCode::BAD_REQUEST, Json(envelope)).into_response()
    }
}

/// Drop-in replacement for `axum::Json` as a request-body extractor: same
/// deserialization, but a malformed body renders as the `invalid_json`
/// error envelope instead of axum's default plain-text rejection.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = JsonRejectionError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let request_id = extension_request_id(req.extensions());
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| JsonRejectionError(rejection, request_id))?;
        Ok(Self(value))
    }
}

/// Read the request id out of an axum request's extensions, falling back to
/// `"unknown"` if the request-id middleware was somehow bypassed.
#[must_use]
pub fn extension_request_id(extensions: &axum::http::Extensions) -> String {
    request_id_of(extensions)
}
