use std::sync::Arc;

use chrono::{DateTime, Utc};
use infergate_core::{CacheEntry, CacheTier};
use sqlx::PgPool;
use sqlx::Row;

use crate::config::DbConfig;
use crate::error::DbError;

/// The durable tier of the Completion Cache: authoritative, survives
/// process restarts. A write here is the serialization point for
/// cross-process/restart deduplication, best-effort only.
pub struct CompletionCacheStore {
    pool: PgPool,
    config: Arc<DbConfig>,
}

impl CompletionCacheStore {
    #[must_use]
    pub fn new(pool: PgPool, config: Arc<DbConfig>) -> Self {
        Self { pool, config }
    }

    /// # Errors
    ///
    /// Returns [`DbError::Query`] on connection failure. A miss is `Ok(None)`,
    /// never an error.
    pub async fn get(&self, fingerprint: &str) -> Result<Option<CacheEntry>, DbError> {
        let table = self.config.completion_cache_table();
        let query = format!("SELECT value, created_at FROM {table} WHERE fingerprint = $1");
        let row = sqlx::query(&query)
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| {
                    let value: String = row.get("value");
                    let created_at: DateTime<Utc> = row.get("created_at");
                    CacheEntry {
                        key: fingerprint.to_owned(),
                        value,
                        created_at,
                        tier: CacheTier::Durable,
                    }
        }))
    }

    /// Upsert: a duplicate durable write for the same fingerprint is
    /// idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Query`] on connection failure.
    pub async fn put(&self, fingerprint: &str, value: &str) -> Result<(), DbError> {
        let table = self.config.completion_cache_table();
        let query = format!(
            "INSERT INTO {table} (fingerprint, value, created_at) VALUES ($1, $2, NOW()) \
            ON CONFLICT (fingerprint) DO UPDATE SET value = EXCLUDED.value"
        );
        sqlx::query(&query)
            .bind(fingerprint)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
