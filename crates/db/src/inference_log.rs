use std::sync::Arc;

use infergate_core::InferenceLog;
use sqlx::PgPool;
use sqlx::Row;

use crate::config::DbConfig;
use crate::error::DbError;

/// The Inference Logger: appends exactly one row per terminal request
/// outcome. Append-only; never updated or deleted.
pub struct InferenceLogStore {
    pool: PgPool,
    config: Arc<DbConfig>,
}

impl InferenceLogStore {
    #[must_use]
    pub fn new(pool: PgPool, config: Arc<DbConfig>) -> Self {
        Self { pool, config }
    }

    /// # Errors
    ///
    /// Returns [`DbError::Query`] on connection or constraint failure.
    pub async fn insert(&self, log: &InferenceLog) -> Result<(), DbError> {
        let table = self.config.inference_logs_table();
        let query = format!(
            "INSERT INTO {table} \
            (id, request_id, api_key_ref, route, model_id, prompt_tokens, completion_tokens, \
                latency_ms, status_code, error_code, cached, created_at) \
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        );
        sqlx::query(&query)
            .bind(log.id)
            .bind(&log.request_id)
            .bind(&log.api_key_ref)
            .bind(log.route.as_str())
            .bind(&log.model_id)
            .bind(log.prompt_tokens)
            .bind(log.completion_tokens)
            .bind(log.latency_ms)
            .bind(i32::from(log.status_code))
            .bind(&log.error_code)
            .bind(log.cached)
            .bind(log.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Count rows for `api_key_ref`, primarily for test assertions
    ///.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Query`] on connection failure.
    pub async fn count_for_key(&self, api_key_ref: &str) -> Result<i64, DbError> {
        let table = self.config.inference_logs_table();
        let query = format!("SELECT COUNT(*) AS n FROM {table} WHERE api_key_ref = $1");
        let row = sqlx::query(&query)
            .bind(api_key_ref)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}
