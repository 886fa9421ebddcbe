//! HTTP surface: shared application state and router wiring.
//! Individual routes live in their own modules, one per resource.

pub mod admin;
pub mod dto;
pub mod extract;
pub mod generate;
pub mod health;
pub mod models;
pub mod openapi;
pub mod schemas;

use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use infergate_db::{ApiKeyStore, RoleStore};
use infergate_gateway::{Gateway, GatewayMetrics};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use self::openapi::ApiDoc;
use crate::auth::{authenticate_and_rate_limit, require_admin_role};
use crate::config::Settings;
use crate::ratelimit::RateLimiter;
use crate::request_id::assign_request_id;

/// Shared state behind every handler and middleware. Cheap to clone: every
/// field is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub api_keys: Arc<ApiKeyStore>,
    pub roles: Arc<RoleStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub metrics: Arc<GatewayMetrics>,
    pub settings: Arc<Settings>,
}

/// Assemble the full router: public health/metrics endpoints, the
/// authenticated `/v1/*` surface, and the admin-gated subset of it
///.
#[must_use]
pub fn router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/v1/admin/models/load", post(admin::load_model))
        .layer(axum::middleware::from_fn(require_admin_role))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            authenticate_and_rate_limit,
    ));

    let protected_routes = Router::new()
        .route("/v1/models", get(models::list_models))
        .route("/v1/schemas", get(schemas::list_schemas))
        .route("/v1/schemas/{schema_id}", get(schemas::get_schema))
        .route("/v1/generate", post(generate::generate))
        .route("/v1/generate/batch", post(generate::generate_batch))
        .route("/v1/extract", post(extract::extract))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            authenticate_and_rate_limit,
    ));

    let public_routes = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/modelz", get(health::modelz))
        .route("/metrics", get(health::metrics));

    let cors = build_cors_layer(&state.settings.cors_allowed_origins);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(assign_request_id))
}

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderName::from_static("x-api-key"),
            axum::http::HeaderName::from_static("x-request-id"),
    ]);
    if allowed_origins.is_empty() {
        layer.allow_origin(AllowOrigin::any())
    } else {
        let origins: Vec<_> = allowed_origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(AllowOrigin::list(origins))
    }
}
