use std::sync::Arc;

use infergate_core::ApiKey;
use sqlx::PgPool;
use sqlx::Row;

use crate::config::DbConfig;
use crate::error::DbError;

/// `ApiKey` persistence. `ApiKey` is created out-of-band by an admin tool
///; this store reads it for authentication and mutates
/// `quota_used` (via [`crate::quota::QuotaLedger`]) and the admin
/// role/active fields.
pub struct ApiKeyStore {
    pool: PgPool,
    config: Arc<DbConfig>,
}

impl ApiKeyStore {
    #[must_use]
    pub fn new(pool: PgPool, config: Arc<DbConfig>) -> Self {
        Self { pool, config }
    }

    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if no key has this hash.
    pub async fn get_by_hash(&self, key_hash: &str) -> Result<ApiKey, DbError> {
        let table = self.config.api_keys_table();
        let query = format!(
            "SELECT key_hash, role, active, quota_monthly, quota_used, created_at \
            FROM {table} WHERE key_hash = $1"
        );
        let row = sqlx::query(&query)
            .bind(key_hash)
            .fetch_one(&self.pool)
            .await?;

        Ok(ApiKey {
                key_hash: row.try_get("key_hash")?,
                role: row.try_get("role")?,
                active: row.try_get("active")?,
                quota_monthly: row.try_get("quota_monthly")?,
                quota_used: row.try_get("quota_used")?,
                created_at: row.try_get("created_at")?,
        })
    }

    /// Create a new `ApiKey` row. Used by admin tooling, not the request path.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Query`] on constraint violation or connection failure.
    pub async fn create(&self, key: &ApiKey) -> Result<(), DbError> {
        let table = self.config.api_keys_table();
        let query = format!(
            "INSERT INTO {table} (key_hash, role, active, quota_monthly, quota_used, created_at) \
            VALUES ($1, $2, $3, $4, $5, $6)"
        );
        sqlx::query(&query)
            .bind(&key.key_hash)
            .bind(&key.role)
            .bind(key.active)
            .bind(key.quota_monthly)
            .bind(key.quota_used)
            .bind(key.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Administrative deactivate.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Query`] on connection failure.
    pub async fn set_active(&self, key_hash: &str, active: bool) -> Result<(), DbError> {
        let table = self.config.api_keys_table();
        let query = format!("UPDATE {table} SET active = $2 WHERE key_hash = $1");
        sqlx::query(&query)
            .bind(key_hash)
            .bind(active)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
