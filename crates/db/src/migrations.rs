use sqlx::PgPool;

use crate::config::DbConfig;

/// Create the `api_keys`, `roles`, `inference_logs`, and `completion_cache`
/// tables if they do not already exist.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if any DDL statement fails.
pub async fn run_migrations(pool: &PgPool, config: &DbConfig) -> Result<(), sqlx::Error> {
    let api_keys_table = config.api_keys_table();
    let roles_table = config.roles_table();
    let inference_logs_table = config.inference_logs_table();
    let completion_cache_table = config.completion_cache_table();

    let create_roles = format!(
        "CREATE TABLE IF NOT EXISTS {roles_table} (
        name TEXT PRIMARY KEY,
        requests_per_minute INTEGER NOT NULL
    )"
);

let create_api_keys = format!(
    "CREATE TABLE IF NOT EXISTS {api_keys_table} (
    key_hash TEXT PRIMARY KEY,
    role TEXT NOT NULL,
    active BOOLEAN NOT NULL DEFAULT TRUE,
    quota_monthly BIGINT,
    quota_used BIGINT NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"
);

// Append-only: no updates except quota_used (Quota Ledger) and admin
// role/active transitions.
let create_inference_logs = format!(
    "CREATE TABLE IF NOT EXISTS {inference_logs_table} (
    id UUID PRIMARY KEY,
    request_id TEXT NOT NULL,
    api_key_ref TEXT NOT NULL,
    route TEXT NOT NULL,
    model_id TEXT NOT NULL,
    prompt_tokens BIGINT,
    completion_tokens BIGINT,
    latency_ms BIGINT NOT NULL,
    status_code INTEGER NOT NULL,
    error_code TEXT,
    cached BOOLEAN NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
)"
);

let create_inference_logs_idx = format!(
    "CREATE INDEX IF NOT EXISTS {}inference_logs_api_key_idx ON {inference_logs_table} (api_key_ref)",
    config.table_prefix
);

// Durable completion cache tier: keyed by fingerprint,
// authoritative across process restarts.
let create_completion_cache = format!(
    "CREATE TABLE IF NOT EXISTS {completion_cache_table} (
    fingerprint TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"
);

sqlx::query(&create_roles).execute(pool).await?;
sqlx::query(&create_api_keys).execute(pool).await?;
sqlx::query(&create_inference_logs).execute(pool).await?;
sqlx::query(&create_inference_logs_idx).execute(pool).await?;
sqlx::query(&create_completion_cache).execute(pool).await?;

Ok(())
}
