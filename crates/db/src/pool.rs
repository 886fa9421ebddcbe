use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};

use crate::config::DbConfig;
use crate::error::DbError;

pub(crate) fn build_connect_options(config: &DbConfig) -> Result<PgConnectOptions, DbError> {
    let mut options: PgConnectOptions = config
        .url
        .parse()
        .map_err(|e: sqlx::Error| DbError::Connection(e.to_string()))?;

    if let Some(ref mode) = config.ssl_mode {
        let ssl_mode = match mode.as_str() {
            "disable" => PgSslMode::Disable,
            "prefer" => PgSslMode::Prefer,
            "require" => PgSslMode::Require,
            "verify-ca" => PgSslMode::VerifyCa,
            "verify-full" => PgSslMode::VerifyFull,
            other => return Err(DbError::Connection(format!("unknown ssl_mode: {other}"))),
        };
        options = options.ssl_mode(ssl_mode);
    }
    if let Some(ref path) = config.ssl_root_cert {
        options = options.ssl_root_cert(path);
    }
    if let Some(ref path) = config.ssl_cert {
        options = options.ssl_client_cert(path);
    }
    if let Some(ref path) = config.ssl_key {
        options = options.ssl_client_key(path);
    }

    Ok(options)
}

/// Connect to `PostgreSQL` and build the connection pool for `config`. Does
/// not run migrations; call [`crate::migrations::run_migrations`] afterward.
///
/// # Errors
///
/// Returns [`DbError::Connection`] if the URL is malformed or the pool
/// cannot be established.
pub async fn connect(config: &DbConfig) -> Result<PgPool, DbError> {
    let options = build_connect_options(config)?;
    PgPoolOptions::new()
        .max_connections(config.pool_size)
        .connect_with(options)
        .await
        .map_err(|e| DbError::Connection(e.to_string()))
}
