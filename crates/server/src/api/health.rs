use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use super::dto::{HealthResponse, ModelzResponse, ReadyResponse};
use super::AppState;

/// `GET /healthz` -- liveness only, never touches the database or a model.
#[utoipa::path(
        get,
        path = "/healthz",
        tag = "Health",
        summary = "Liveness probe",
        responses((status = 200, description = "Process is up", body = HealthResponse))
)]
pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// `GET /readyz` -- database reachability and model-load readiness
///.
#[utoipa::path(
        get,
        path = "/readyz",
        tag = "Health",
        summary = "Readiness probe",
        responses(
            (status = 200, description = "Ready to serve traffic", body = ReadyResponse),
            (status = 503, description = "Not yet ready", body = ReadyResponse),
        )
)]
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let readiness = state.gateway.readiness().await;
    let ready = readiness.database_ok && readiness.model_ready;
    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(ReadyResponse {
                ready,
                database_ok: readiness.database_ok,
                model_ready: readiness.model_ready,
        }),
    )
}

/// `GET /modelz` -- whether at least one model is usable, gated by
/// `require_model_ready`.
#[utoipa::path(
        get,
        path = "/modelz",
        tag = "Health",
        summary = "Model readiness probe",
        responses(
            (status = 200, description = "A usable model is bound", body = ModelzResponse),
            (status = 503, description = "No model ready yet", body = ModelzResponse),
        )
)]
pub async fn modelz(State(state): State<AppState>) -> impl IntoResponse {
    let model_ready = state.gateway.model_ready();
    let status = if model_ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(ModelzResponse {
                ready: model_ready,
                model_ready,
        }),
    )
}

/// `GET /metrics` -- request counters in Prometheus text exposition format.
#[utoipa::path(
        get,
        path = "/metrics",
        tag = "Health",
        summary = "Request counters",
        responses((status = 200, description = "Prometheus text exposition", body = String))
)]
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
