//! Settings: an immutable snapshot of deployment flags read once at
//! startup. An optional TOML file merged with environment variables, every
//! field defaultable so a missing config file still boots a usable gateway.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use infergate_core::{LoadMode, ModelSpec, ModelsConfig};
use infergate_db::DbConfig;
use serde::{Deserialize, Serialize};

#[cfg(feature = "redis")]
use infergate_state_redis::RedisConfig;

/// Top-level deployment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub redis: RedisSettings,
    #[serde(default = "default_schemas_dir")]
    pub schemas_dir: PathBuf,
    #[serde(default = "default_policy_decision_path")]
    pub policy_decision_path: PathBuf,
    #[serde(default)]
    pub policy_watch: bool,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
    #[serde(default)]
    pub require_model_ready: bool,
    #[serde(default = "default_true")]
    pub enable_generate: bool,
    #[serde(default = "default_true")]
    pub enable_extract: bool,
    #[serde(default = "default_models")]
    pub models: ModelsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_shutdown_timeout_seconds")]
    pub shutdown_timeout_seconds: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_seconds: default_shutdown_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
    #[serde(default)]
    pub ssl_mode: Option<String>,
    #[serde(default)]
    pub ssl_root_cert: Option<String>,
    #[serde(default)]
    pub ssl_cert: Option<String>,
    #[serde(default)]
    pub ssl_key: Option<String>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_size: default_pool_size(),
            schema: default_schema(),
            table_prefix: default_table_prefix(),
            ssl_mode: None,
            ssl_root_cert: None,
            ssl_cert: None,
            ssl_key: None,
        }
    }
}

impl DatabaseSettings {
    #[must_use]
    pub fn to_db_config(&self) -> DbConfig {
        DbConfig {
            url: self.url.clone(),
            pool_size: self.pool_size,
            schema: self.schema.clone(),
            table_prefix: self.table_prefix.clone(),
            ssl_mode: self.ssl_mode.clone(),
            ssl_root_cert: self.ssl_root_cert.clone(),
            ssl_cert: self.ssl_cert.clone(),
            ssl_key: self.ssl_key.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_redis_connection_timeout_seconds")]
    pub connection_timeout_seconds: u64,
    #[serde(default)]
    pub tls_enabled: bool,
    #[serde(default)]
    pub tls_insecure: bool,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_redis_url(),
            prefix: default_redis_prefix(),
            pool_size: default_redis_pool_size(),
            connection_timeout_seconds: default_redis_connection_timeout_seconds(),
            tls_enabled: false,
            tls_insecure: false,
        }
    }
}

#[cfg(feature = "redis")]
impl RedisSettings {
    #[must_use]
    pub fn to_redis_config(&self) -> RedisConfig {
        RedisConfig {
            url: self.url.clone(),
            prefix: self.prefix.clone(),
            pool_size: self.pool_size,
            connection_timeout: Duration::from_secs(self.connection_timeout_seconds),
            tls_enabled: self.tls_enabled,
            tls_insecure: self.tls_insecure,
        }
    }
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_timeout_seconds() -> u64 {
    30
}

fn default_database_url() -> String {
    String::from("postgres://localhost:5432/infergate")
}

fn default_pool_size() -> u32 {
    5
}

fn default_schema() -> String {
    String::from("public")
}

fn default_table_prefix() -> String {
    String::from("infergate_")
}

fn default_redis_url() -> String {
    String::from("redis://127.0.0.1:6379")
}

fn default_redis_prefix() -> String {
    String::from("infergate")
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_connection_timeout_seconds() -> u64 {
    5
}

fn default_schemas_dir() -> PathBuf {
    PathBuf::from("schemas")
}

fn default_policy_decision_path() -> PathBuf {
    PathBuf::from("policy_decision.json")
}

fn default_max_concurrent_requests() -> usize {
    2
}

fn default_true() -> bool {
    true
}

/// A single mock model so the server is runnable with no config file at all.
fn default_models() -> ModelsConfig {
    ModelsConfig {
        models: vec![ModelSpec {
                id: String::from("default"),
                backend: String::from("mock://default"),
                load_mode: LoadMode::Eager,
                capabilities: HashMap::new(),
                dtype: None,
                device: None,
                quantization: None,
        }],
        default_model: String::from("default"),
        default_capabilities: HashMap::from([
                (String::from("generate"), true),
                (String::from("extract"), true),
        ]),
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            database: DatabaseSettings::default(),
            redis: RedisSettings::default(),
            schemas_dir: default_schemas_dir(),
            policy_decision_path: default_policy_decision_path(),
            policy_watch: false,
            max_concurrent_requests: default_max_concurrent_requests(),
            cors_allowed_origins: Vec::new(),
            require_model_ready: false,
            enable_generate: true,
            enable_extract: true,
            models: default_models(),
        }
    }
}

impl Settings {
    /// Load from `path` if it exists, else start from defaults; either way,
    /// apply environment variable overrides on top.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message if the file exists but fails to
    /// parse as TOML.
    pub fn load(path: &Path) -> Result<Self, String> {
        let mut settings = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read config file {}: {e}", path.display()))?;
            toml::from_str(&contents)
                .map_err(|e| format!("failed to parse config file {}: {e}", path.display()))?
        } else {
            Self::default()
        };
        settings.apply_env_overrides();
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = std::env::var("REDIS_URL") {
            self.redis.url = v;
        }
        if let Ok(v) = std::env::var("REDIS_ENABLED") {
            self.redis.enabled = parse_bool(&v, self.redis.enabled);
        }
        if let Ok(v) = std::env::var("SCHEMAS_DIR") {
            self.schemas_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("MODEL_LOAD_MODE") {
            if let Ok(mode) = v.parse::<LoadMode>() {
                for model in &mut self.models.models {
                    model.load_mode = mode;
                }
            }
        }
        if let Ok(v) = std::env::var("REQUIRE_MODEL_READY") {
            self.require_model_ready = parse_bool(&v, self.require_model_ready);
        }
        if let Ok(v) = std::env::var("POLICY_DECISION_PATH") {
            self.policy_decision_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("MAX_CONCURRENT_REQUESTS") {
            if let Ok(n) = v.parse::<usize>() {
                self.max_concurrent_requests = n;
            }
        }
        if let Ok(v) = std::env::var("CORS_ALLOWED_ORIGINS") {
            self.cors_allowed_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect();
        }
        if let Ok(v) = std::env::var("ENABLE_GENERATE") {
            self.enable_generate = parse_bool(&v, self.enable_generate);
        }
        if let Ok(v) = std::env::var("ENABLE_EXTRACT") {
            self.enable_extract = parse_bool(&v, self.enable_extract);
        }
    }

    /// The deployment-level capability gate fed to [`infergate_gateway::GatewayBuilder::deployment_capabilities`].
    #[must_use]
    pub fn deployment_capabilities(&self) -> HashMap<String, bool> {
        HashMap::from([
                (String::from("generate"), self.enable_generate),
                (String::from("extract"), self.enable_extract),
        ])
    }

    #[must_use]
    pub fn db_config(&self) -> Arc<DbConfig> {
        Arc::new(self.database.to_db_config())
    }
}

fn parse_bool(raw: &str, current: bool) -> bool {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_boot_with_one_mock_model() {
        let settings = Settings::default();
        assert_eq!(settings.models.models.len(), 1);
        assert_eq!(settings.models.default_model, "default");
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let settings = Settings::load(Path::new("/nonexistent/infergate.toml")).unwrap();
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn deployment_capabilities_reflect_enable_flags() {
        let mut settings = Settings::default();
        settings.enable_extract = false;
        let caps = settings.deployment_capabilities();
        assert_eq!(caps.get("extract"), Some(&false));
        assert_eq!(caps.get("generate"), Some(&true));
    }

    #[test]
    fn parse_bool_keeps_current_on_unrecognized_value() {
        assert!(parse_bool("nonsense", true));
        assert!(!parse_bool("nonsense", false));
        assert!(parse_bool("yes", false));
        assert!(!parse_bool("0", true));
    }
}
