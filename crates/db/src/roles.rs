use std::sync::Arc;

use infergate_core::Role;
use sqlx::PgPool;
use sqlx::Row;

use crate::config::DbConfig;
use crate::error::DbError;

/// `Role` persistence: the requests-per-minute cap the Rate Limiter
/// reads per API key's role.
pub struct RoleStore {
    pool: PgPool,
    config: Arc<DbConfig>,
}

impl RoleStore {
    #[must_use]
    pub fn new(pool: PgPool, config: Arc<DbConfig>) -> Self {
        Self { pool, config }
    }

    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if no role has this name.
    pub async fn get_by_name(&self, name: &str) -> Result<Role, DbError> {
        let table = self.config.roles_table();
        let query = format!("SELECT name, requests_per_minute FROM {table} WHERE name = $1");
        let row = sqlx::query(&query)
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(Role {
                name: row.try_get("name")?,
                requests_per_minute: u32::try_from(row.try_get::<i32, _>("requests_per_minute")?)
                    .unwrap_or(0),
        })
    }

    /// Upsert a role definition. Used by admin tooling and deployment seed
    /// scripts, not the request path.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Query`] on connection failure.
    pub async fn upsert(&self, role: &Role) -> Result<(), DbError> {
        let table = self.config.roles_table();
        let query = format!(
            "INSERT INTO {table} (name, requests_per_minute) VALUES ($1, $2) \
            ON CONFLICT (name) DO UPDATE SET requests_per_minute = EXCLUDED.requests_per_minute"
        );
        sqlx::query(&query)
            .bind(&role.name)
            .bind(i32::try_from(role.requests_per_minute).unwrap_or(i32::MAX))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
