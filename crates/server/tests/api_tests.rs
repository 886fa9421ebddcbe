//! End-to-end HTTP tests against a real router: authentication, rate
//! limiting, quota, capability gating, the completion cache, and the
//! extraction repair flow. Requires a reachable Postgres at `DATABASE_URL`
//! (falls back to `postgres://localhost:5432/infergate_test`); every test
//! gets its own table prefix so they can run concurrently against the same
//! database.

#![cfg(feature = "integration")]

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{self, Request, StatusCode};
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;

use infergate_core::{ApiKey, LoadMode, ModelSpec, ModelsConfig, Role};
use infergate_db::{ApiKeyStore, CompletionCacheStore, DbConfig, InferenceLogStore, QuotaLedger, RoleStore};
use infergate_gateway::{ConcurrencyGate, GatewayBuilder, GatewayMetrics, PolicySnapshotLoader};
use infergate_model::{ModelBackend, ModelRegistry, MockModelBackend};
use infergate_schema::SchemaRegistry;
use infergate_server::api::{router, AppState};
use infergate_server::config::Settings;
use infergate_server::ratelimit::RateLimiter;

async fn test_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost:5432/infergate_test".to_owned());
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("connect to test database")
}

/// Everything one test needs to drive the router and inspect what landed in
/// the database afterward.
struct TestApp {
    router: axum::Router,
    pool: PgPool,
    config: DbConfig,
}

struct TestAppOpts {
    backends: HashMap<String, Arc<dyn ModelBackend>>,
    models: Vec<ModelSpec>,
    default_model: String,
    default_capabilities: HashMap<String, bool>,
    enable_generate: bool,
    enable_extract: bool,
    max_concurrent_requests: usize,
    policy_path: Option<std::path::PathBuf>,
    schemas_dir: std::path::PathBuf,
}

impl Default for TestAppOpts {
    fn default() -> Self {
        let mut backends: HashMap<String, Arc<dyn ModelBackend>> = HashMap::new();
        backends.insert("m1".to_owned(), Arc::new(MockModelBackend::always("ok")));
        Self {
            backends,
            models: vec![ModelSpec {
                id: "m1".to_owned(),
                backend: "mock://m1".to_owned(),
                load_mode: LoadMode::Eager,
                capabilities: HashMap::new(),
                dtype: None,
                device: None,
                quantization: None,
            }],
            default_model: "m1".to_owned(),
            default_capabilities: HashMap::from([
                ("generate".to_owned(), true),
                ("extract".to_owned(), true),
            ]),
            enable_generate: true,
            enable_extract: true,
            max_concurrent_requests: 2,
            policy_path: Some(policy_file(r#"{"ok": true, "enable_extract": true}"#)),
            schemas_dir: empty_schema_dir(),
        }
    }
}

fn empty_schema_dir() -> std::path::PathBuf {
    tempfile::tempdir().unwrap().into_path()
}

fn schema_dir_with(name: &str, document: &str) -> std::path::PathBuf {
    let dir = tempfile::tempdir().unwrap().into_path();
    let mut f = std::fs::File::create(dir.join(format!("{name}.json"))).unwrap();
    f.write_all(document.as_bytes()).unwrap();
    dir
}

fn policy_file(contents: &str) -> std::path::PathBuf {
    let file = tempfile::NamedTempFile::new().unwrap();
    let path = file.into_temp_path().keep().unwrap();
    std::fs::write(&path, contents).unwrap();
    path
}

async fn build_test_app(opts: TestAppOpts) -> TestApp {
    let pool = test_pool().await;
    let config = DbConfig {
        table_prefix: format!("infergate_test_{}_", uuid::Uuid::new_v4().simple()),
        ..DbConfig::default()
    };
    infergate_db::migrations::run_migrations(&pool, &config)
        .await
        .expect("migrations should succeed");
    let config = Arc::new(config);

    let roles = Arc::new(RoleStore::new(pool.clone(), Arc::clone(&config)));
    roles.upsert(&Role::new("standard", 1_000)).await.unwrap();
    roles.upsert(&Role::new("admin", 1_000)).await.unwrap();

    let models_config = Arc::new(ModelsConfig {
        models: opts.models,
        default_model: opts.default_model,
        default_capabilities: opts.default_capabilities,
    });
    let model_registry = Arc::new(ModelRegistry::new(&models_config, opts.backends).unwrap());
    model_registry.startup().await.unwrap();

    let policy_path = opts
        .policy_path
        .unwrap_or_else(|| std::path::PathBuf::from("/nonexistent/policy.json"));
    let policy = Arc::new(PolicySnapshotLoader::new(policy_path));

    let schemas = Arc::new(SchemaRegistry::new(opts.schemas_dir));
    let durable_cache = Arc::new(CompletionCacheStore::new(pool.clone(), Arc::clone(&config)));
    let logs = Arc::new(InferenceLogStore::new(pool.clone(), Arc::clone(&config)));
    let quota = Arc::new(QuotaLedger::new(pool.clone(), Arc::clone(&config)));
    let api_keys = Arc::new(ApiKeyStore::new(pool.clone(), Arc::clone(&config)));

    let mut deployment_capabilities = HashMap::new();
    deployment_capabilities.insert("generate".to_owned(), opts.enable_generate);
    deployment_capabilities.insert("extract".to_owned(), opts.enable_extract);

    let gateway = GatewayBuilder::new()
        .models_config(Arc::clone(&models_config))
        .model_registry(model_registry)
        .schemas(schemas)
        .policy(policy)
        .durable_cache(durable_cache)
        .concurrency(Arc::new(ConcurrencyGate::new(opts.max_concurrent_requests)))
        .quota(quota)
        .logs(logs)
        .deployment_capabilities(deployment_capabilities)
        .require_model_ready(false)
        .build()
        .unwrap();

    let state = AppState {
        gateway: Arc::new(gateway),
        api_keys,
        roles,
        rate_limiter: Arc::new(RateLimiter::new()),
        metrics: Arc::new(GatewayMetrics::new()),
        settings: Arc::new(Settings::default()),
    };

    TestApp {
        router: router(state),
        pool,
        config: Arc::try_unwrap(config).unwrap_or_else(|arc| (*arc).clone()),
    }
}

impl TestApp {
    async fn seed_key(&self, role: &str, quota_monthly: Option<i64>) -> String {
        let store = ApiKeyStore::new(self.pool.clone(), Arc::new(self.config.clone()));
        let raw = uuid::Uuid::new_v4().to_string();
        store.create(&ApiKey::new(&raw, role, quota_monthly)).await.unwrap();
        raw
    }

    async fn log_count_for(&self, raw_key: &str) -> i64 {
        let store = InferenceLogStore::new(self.pool.clone(), Arc::new(self.config.clone()));
        store.count_for_key(&ApiKey::hash(raw_key)).await.unwrap()
    }

    async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}

fn post(path: &str, api_key: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(http::Method::POST)
        .uri(path)
        .header("content-type", "application/json")
        .header("x-api-key", api_key)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(path: &str, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(http::Method::GET).uri(path);
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::empty()).unwrap()
}

// -- Scenario 1: a single uncached generate call -------------------------

#[tokio::test]
async fn generate_without_cache_succeeds_and_logs_one_row() {
    let app = build_test_app(TestAppOpts::default()).await;
    let key = app.seed_key("standard", None).await;

    let (status, body) = app
        .call(post(
            "/v1/generate",
            &key,
            json!({"prompt": "hi", "cache": false}),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["output"], "ok");
    assert_eq!(body["cached"], false);
    assert_eq!(app.log_count_for(&key).await, 1);
}

// -- Scenario 2: cache hit on the second identical request ----------------

#[tokio::test]
async fn second_identical_cached_request_is_served_from_cache() {
    let app = build_test_app(TestAppOpts::default()).await;
    let key = app.seed_key("standard", None).await;
    let body = json!({"prompt": "hello cache", "cache": true, "temperature": 0.0});

    let (status1, first) = app.call(post("/v1/generate", &key, body.clone())).await;
    let (status2, second) = app.call(post("/v1/generate", &key, body)).await;

    assert_eq!(status1, StatusCode::OK);
    assert_eq!(status2, StatusCode::OK);
    assert_eq!(first["cached"], false);
    assert_eq!(second["cached"], true);
    assert_eq!(first["output"], second["output"]);
}

#[tokio::test]
async fn concurrent_identical_requests_invoke_the_backend_once() {
    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let backend = Arc::new(CountingBackend {
        calls: Arc::clone(&calls),
    });
    let mut opts = TestAppOpts::default();
    opts.backends.insert("m1".to_owned(), backend);
    let app = Arc::new(build_test_app(opts).await);
    let key = app.seed_key("standard", None).await;

    let mut handles = Vec::new();
    for _ in 0..6 {
        let app = Arc::clone(&app);
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            app.call(post(
                "/v1/generate",
                &key,
                json!({"prompt": "race", "cache": true}),
            ))
            .await
        }));
    }
    for h in handles {
        let (status, _) = h.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[derive(Debug)]
struct CountingBackend {
    calls: Arc<std::sync::atomic::AtomicUsize>,
}

#[async_trait::async_trait]
impl ModelBackend for CountingBackend {
    async fn generate(
        &self,
        _prompt: &str,
        _params: &infergate_model::GenerationParams,
    ) -> Result<String, infergate_model::ModelError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok("raced".to_owned())
    }

    async fn ensure_loaded(&self) -> Result<(), infergate_model::ModelError> {
        Ok(())
    }
}

// -- Scenario 3/4: extraction with and without repair ----------------------

const TICKET_SCHEMA: &str = r#"{"type":"object","properties":{"id":{"type":"string"}},"required":["id"]}"#;

#[tokio::test]
async fn extract_repairs_after_an_initial_non_json_response() {
    let mut opts = TestAppOpts::default();
    opts.schemas_dir = schema_dir_with("ticket_v1", TICKET_SCHEMA);
    opts.backends.insert(
        "m1".to_owned(),
        Arc::new(MockModelBackend::sequence([
            "not json",
            "<<<JSON>>>{\"id\":\"repaired\"}<<<END>>>",
        ])),
    );
    let app = build_test_app(opts).await;
    let key = app.seed_key("standard", None).await;

    let (status, body) = app
        .call(post(
            "/v1/extract",
            &key,
            json!({"schema_id": "ticket_v1", "text": "ticket id repaired", "repair": true}),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], "repaired");
    assert_eq!(body["repair_attempted"], true);
}

#[tokio::test]
async fn extract_without_repair_surfaces_invalid_json() {
    let mut opts = TestAppOpts::default();
    opts.schemas_dir = schema_dir_with("ticket_v1", TICKET_SCHEMA);
    opts.backends.insert(
        "m1".to_owned(),
        Arc::new(MockModelBackend::always("not json")),
    );
    let app = build_test_app(opts).await;
    let key = app.seed_key("standard", None).await;

    let (status, body) = app
        .call(post(
            "/v1/extract",
            &key,
            json!({"schema_id": "ticket_v1", "text": "whatever", "repair": false}),
        ))
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let code = body["code"].as_str().unwrap();
    assert!(matches!(code, "invalid_json" | "schema_validation_failed"));
}

#[tokio::test]
async fn extract_against_a_missing_schema_is_404() {
    let app = build_test_app(TestAppOpts::default()).await;
    let key = app.seed_key("standard", None).await;

    let (status, body) = app
        .call(post(
            "/v1/extract",
            &key,
            json!({"schema_id": "does_not_exist", "text": "whatever"}),
        ))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "schema_not_found");
}

// -- Scenario 5: policy denial ---------------------------------------------

#[tokio::test]
async fn policy_file_disabling_extract_denies_the_route_and_the_models_listing() {
    let mut opts = TestAppOpts::default();
    opts.policy_path = Some(policy_file(r#"{"enable_extract": false}"#));
    let app = build_test_app(opts).await;
    let key = app.seed_key("standard", None).await;

    let (status, body) = app
        .call(post(
            "/v1/extract",
            &key,
            json!({"schema_id": "anything", "text": "x"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "capability_not_supported");
    assert_eq!(body["extra"]["model_capabilities"]["extract"], false);

    let (status, body) = app.call(get("/v1/models", Some(&key))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["models"][0]["capabilities"]["extract"], false);
}

#[tokio::test]
async fn deployment_disabled_capability_is_501_not_400() {
    let mut opts = TestAppOpts::default();
    opts.enable_extract = false;
    let app = build_test_app(opts).await;
    let key = app.seed_key("standard", None).await;

    let (status, body) = app
        .call(post(
            "/v1/extract",
            &key,
            json!({"schema_id": "anything", "text": "x"}),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body["code"], "capability_disabled");
}

// -- Scenario 6: quota is consumed on attempt, not success -----------------

#[tokio::test]
async fn monthly_quota_is_consumed_even_by_a_failing_request() {
    let app = build_test_app(TestAppOpts::default()).await;
    let key = app.seed_key("standard", Some(1)).await;

    let (status, _) = app
        .call(post("/v1/generate", &key, json!({"prompt": "one", "cache": false})))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(post("/v1/generate", &key, json!({"prompt": "two", "cache": false})))
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["code"], "quota_exhausted");

    // A third request is rejected by quota, not by the (unrelated) missing
    // schema — quota is gone, no attempt reaches the schema lookup at all.
    let (status, body) = app
        .call(post(
            "/v1/extract",
            &key,
            json!({"schema_id": "missing", "text": "x"}),
        ))
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["code"], "quota_exhausted");
}

// -- Scenario 7: rate limiting ----------------------------------------------

#[tokio::test]
async fn rate_limit_rejects_past_the_role_cap_with_retry_after() {
    let app = build_test_app(TestAppOpts::default()).await;
    let key = app.seed_key("standard", None).await;
    let roles = RoleStore::new(app.pool.clone(), Arc::new(app.config.clone()));
    roles.upsert(&Role::new("standard", 1)).await.unwrap();

    let (status1, _) = app
        .call(post("/v1/generate", &key, json!({"prompt": "a", "cache": false})))
        .await;
    assert_eq!(status1, StatusCode::OK);

    let (status2, body) = app
        .call(post("/v1/generate", &key, json!({"prompt": "b", "cache": false})))
        .await;
    assert_eq!(status2, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "rate_limited");
    assert!(body["extra"]["retry_after"].as_u64().unwrap() >= 1);
}

// -- Authentication ---------------------------------------------------------

#[tokio::test]
async fn missing_api_key_header_is_401() {
    let app = build_test_app(TestAppOpts::default()).await;
    let (status, body) = app
        .call(post("/v1/generate", "", json!({"prompt": "hi"})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "missing_api_key");
}

#[tokio::test]
async fn unknown_api_key_is_401() {
    let app = build_test_app(TestAppOpts::default()).await;
    let (status, body) = app
        .call(post(
            "/v1/generate",
            "not-a-real-key",
            json!({"prompt": "hi"}),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "invalid_api_key");
}

#[tokio::test]
async fn inactive_key_is_401() {
    let app = build_test_app(TestAppOpts::default()).await;
    let key = app.seed_key("standard", None).await;
    let store = ApiKeyStore::new(app.pool.clone(), Arc::new(app.config.clone()));
    store.set_active(&ApiKey::hash(&key), false).await.unwrap();

    let (status, body) = app
        .call(post("/v1/generate", &key, json!({"prompt": "hi"})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "invalid_api_key");
}

// -- Admin model loading -----------------------------------------------------

#[tokio::test]
async fn off_model_rejects_until_admin_loads_it() {
    let mut opts = TestAppOpts::default();
    opts.models[0].load_mode = LoadMode::Off;
    let app = build_test_app(opts).await;
    let standard_key = app.seed_key("standard", None).await;
    let admin_key = app.seed_key("admin", None).await;

    let (status, body) = app
        .call(post(
            "/v1/generate",
            &standard_key,
            json!({"prompt": "hi", "cache": false}),
        ))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "model_not_loaded");

    let (status, _) = app
        .call(post(
            "/v1/admin/models/load",
            &admin_key,
            json!({"model_id": "m1"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(post(
            "/v1/generate",
            &standard_key,
            json!({"prompt": "hi", "cache": false}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_route_rejects_non_admin_callers() {
    let mut opts = TestAppOpts::default();
    opts.models[0].load_mode = LoadMode::Off;
    let app = build_test_app(opts).await;
    let standard_key = app.seed_key("standard", None).await;

    let (status, _) = app
        .call(post(
            "/v1/admin/models/load",
            &standard_key,
            json!({"model_id": "m1"}),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// -- Batch generate: per-item failures don't poison the batch ---------------

#[tokio::test]
async fn batch_generate_preserves_order_and_per_item_cache_flags() {
    let app = build_test_app(TestAppOpts::default()).await;
    let key = app.seed_key("standard", None).await;

    let (status, body) = app
        .call(post(
            "/v1/generate/batch",
            &key,
            json!({"prompts": ["one", "two", "three"], "cache": false}),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r["output"] == "ok"));
}

// -- Schemas and models listings ---------------------------------------------

#[tokio::test]
async fn schemas_endpoints_list_and_fetch_a_document() {
    let mut opts = TestAppOpts::default();
    opts.schemas_dir = schema_dir_with("ticket_v1", TICKET_SCHEMA);
    let app = build_test_app(opts).await;
    let key = app.seed_key("standard", None).await;

    let (status, body) = app.call(get("/v1/schemas/ticket_v1", Some(&key))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "object");

    let (status, body) = app.call(get("/v1/schemas/does_not_exist", Some(&key))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "schema_not_found");
}

#[tokio::test]
async fn models_endpoint_reports_load_state_and_merged_capabilities() {
    let app = build_test_app(TestAppOpts::default()).await;
    let key = app.seed_key("standard", None).await;

    let (status, body) = app.call(get("/v1/models", Some(&key))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["models"][0]["model_id"], "m1");
    assert_eq!(body["models"][0]["loaded"], true);
    assert_eq!(body["models"][0]["capabilities"]["generate"], true);
}

// -- Health surface -----------------------------------------------------------

#[tokio::test]
async fn healthz_and_readyz_report_up() {
    let app = build_test_app(TestAppOpts::default()).await;
    let (status, body) = app.call(get("/healthz", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app.call(get("/readyz", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
}
