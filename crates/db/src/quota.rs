use std::sync::Arc;

use sqlx::PgPool;
use sqlx::Row;

use crate::config::DbConfig;
use crate::error::DbError;

/// The Quota Ledger: a transactional monthly counter per API key. Quota is
/// consumed on *attempt*, not success — the caller invokes
/// [`QuotaLedger::check_and_consume`] once per request before backend work,
/// regardless of how the request later terminates.
pub struct QuotaLedger {
    pool: PgPool,
    config: Arc<DbConfig>,
}

impl QuotaLedger {
    #[must_use]
    pub fn new(pool: PgPool, config: Arc<DbConfig>) -> Self {
        Self { pool, config }
    }

    /// Within one transaction: lock the key's row, compare `quota_used`
    /// against `quota_monthly`, and either reject without mutating state or
    /// increment `quota_used` by one and commit.
    ///
    /// Returns `true` if the request is admitted (quota consumed), `false`
    /// if the monthly cap is already reached.
    ///
    /// # Errors
    ///
    /// [`DbError::NotFound`] if `key_hash` has no row; [`DbError::Query`] on
    /// any other database failure.
    pub async fn check_and_consume(&self, key_hash: &str) -> Result<bool, DbError> {
        let table = self.config.api_keys_table();
        let mut tx = self.pool.begin().await?;

        let select = format!(
            "SELECT quota_used, quota_monthly FROM {table} WHERE key_hash = $1 FOR UPDATE"
        );
        let row = sqlx::query(&select)
            .bind(key_hash)
            .fetch_one(&mut *tx)
            .await?;

        let quota_used: i64 = row.try_get("quota_used")?;
        let quota_monthly: Option<i64> = row.try_get("quota_monthly")?;

        if let Some(cap) = quota_monthly {
            if quota_used >= cap {
                tx.commit().await?;
                return Ok(false);
            }
        }

        let update = format!("UPDATE {table} SET quota_used = quota_used + 1 WHERE key_hash = $1");
        sqlx::query(&update)
            .bind(key_hash)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}
