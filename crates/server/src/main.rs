use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use infergate_core::{GatewayError, ModelSpec, ModelsConfig};
use infergate_db::{ApiKeyStore, CompletionCacheStore, InferenceLogStore, QuotaLedger, RoleStore};
use infergate_gateway::{ConcurrencyGate, GatewayBuilder, GatewayMetrics, PolicyFileWatch, PolicySnapshotLoader};
use infergate_model::{HttpBackendConfig, HttpModelBackend, ModelBackend, ModelRegistry};
use infergate_schema::SchemaRegistry;
use infergate_server::api::{router, AppState};
use infergate_server::config::Settings;
use infergate_server::ratelimit::RateLimiter;
use infergate_state::StateStore;
use tracing::info;

/// Infergate inference gateway HTTP server.
#[derive(Parser, Debug)]
#[command(name = "infergate-server", about = "Standalone HTTP server for Infergate")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "infergate.toml")]
    config: PathBuf,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server (the default if no subcommand is given).
    Serve,
    /// Resolve configuration (file + environment overrides) and print it as
    /// TOML without starting the server, for deployment sanity checks.
    PrintConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;

    if matches!(cli.command, Some(Commands::PrintConfig)) {
        println!("{}", toml::to_string_pretty(&settings)?);
        return Ok(());
    }

    run_server(settings, cli.host, cli.port).await
}

async fn run_server(
    mut settings: Settings,
    host_override: Option<String>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(host) = host_override {
        settings.server.host = host;
    }
    if let Some(port) = port_override {
        settings.server.port = port;
    }
    let settings = Arc::new(settings);

    let db_config = settings.db_config();
    let pool = infergate_db::pool::connect(&db_config).await?;
    infergate_db::migrations::run_migrations(&pool, &db_config).await?;

    let api_keys = Arc::new(ApiKeyStore::new(pool.clone(), Arc::clone(&db_config)));
    let roles = Arc::new(RoleStore::new(pool.clone(), Arc::clone(&db_config)));
    let logs = Arc::new(InferenceLogStore::new(pool.clone(), Arc::clone(&db_config)));
    let quota = Arc::new(QuotaLedger::new(pool.clone(), Arc::clone(&db_config)));
    let durable_cache = Arc::new(CompletionCacheStore::new(pool.clone(), Arc::clone(&db_config)));

    let schemas = Arc::new(SchemaRegistry::new(settings.schemas_dir.clone()));

    let models_config: Arc<ModelsConfig> = Arc::new(settings.models.clone());
    let model_registry = Arc::new(build_model_registry(&models_config)?);
    model_registry.startup().await?;

    let policy = Arc::new(PolicySnapshotLoader::new(settings.policy_decision_path.clone()));
    let _policy_watch = if settings.policy_watch {
        Some(PolicyFileWatch::spawn(Arc::clone(&policy))?)
    } else {
        None
    };

    let fast_cache: Option<Arc<dyn StateStore>> = build_fast_cache(&settings)?;

    let mut gateway_builder = GatewayBuilder::new()
        .models_config(Arc::clone(&models_config))
        .model_registry(Arc::clone(&model_registry))
        .schemas(Arc::clone(&schemas))
        .policy(Arc::clone(&policy))
        .durable_cache(durable_cache)
        .concurrency(Arc::new(ConcurrencyGate::new(settings.max_concurrent_requests)))
        .quota(quota)
        .logs(logs)
        .deployment_capabilities(settings.deployment_capabilities())
        .require_model_ready(settings.require_model_ready);
    if let Some(store) = fast_cache {
        gateway_builder = gateway_builder.fast_cache(store, Some(Duration::from_secs(300)));
    }
    let gateway = gateway_builder.build()?;

    let state = AppState {
        gateway: Arc::new(gateway),
        api_keys,
        roles,
        rate_limiter: Arc::new(RateLimiter::new()),
        metrics: Arc::new(GatewayMetrics::new()),
        settings: Arc::clone(&settings),
    };

    let app = router(state);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "infergate-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("infergate-server shut down");
    Ok(())
}

/// Build one backend per configured model from its `backend` descriptor:
/// `mock://<canned response>` for a deterministic in-process backend
/// (useful for demo deployments and the default config), anything else
/// treated as an HTTP chat-completions endpoint. The backend's API key, if
/// any, comes from `<MODEL_ID>_API_KEY` (uppercased, `-` replaced with `_`).
fn build_model_registry(models_config: &ModelsConfig) -> Result<ModelRegistry, GatewayError> {
    let mut backends: HashMap<String, Arc<dyn ModelBackend>> = HashMap::new();
    for spec in &models_config.models {
        let backend = build_backend(spec)?;
        backends.insert(spec.id.clone(), backend);
    }
    ModelRegistry::new(models_config, backends)
        .map_err(|e| GatewayError::Internal(format!("model registry: {e}")))
}

fn build_backend(spec: &ModelSpec) -> Result<Arc<dyn ModelBackend>, GatewayError> {
    if let Some(response) = spec.backend.strip_prefix("mock://") {
        let response = if response.is_empty() { "mock output" } else { response };
        return Ok(Arc::new(infergate_model::MockModelBackend::always(response)));
    }

    let env_key = format!("{}_API_KEY", spec.id.to_uppercase().replace('-', "_"));
    let mut config = HttpBackendConfig::new(spec.backend.clone(), spec.id.clone());
    if let Ok(api_key) = std::env::var(env_key) {
        config = config.with_api_key(api_key);
    }
    let backend = HttpModelBackend::new(config)
        .map_err(|e| GatewayError::Internal(format!("model backend '{}': {e}", spec.id)))?;
    Ok(Arc::new(backend))
}

#[cfg(feature = "redis")]
fn build_fast_cache(settings: &Settings) -> Result<Option<Arc<dyn StateStore>>, Box<dyn std::error::Error>> {
    if !settings.redis.enabled {
        return Ok(None);
    }
    let config = settings.redis.to_redis_config();
    let store = infergate_state_redis::RedisStateStore::new(&config)?;
    Ok(Some(Arc::new(store)))
}

#[cfg(not(feature = "redis"))]
fn build_fast_cache(settings: &Settings) -> Result<Option<Arc<dyn StateStore>>, Box<dyn std::error::Error>> {
    if settings.redis.enabled {
        tracing::warn!("redis.enabled is set but the server was built without the 'redis' feature; falling back to the durable tier only");
    }
    Ok(None)
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
