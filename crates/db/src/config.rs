/// Configuration for the Postgres persistence layer: `ApiKey`/Role storage,
/// the Quota Ledger, the Inference Logger, and the durable completion cache
/// tier.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// `PostgreSQL` connection URL, from `DATABASE_URL`.
    pub url: String,
    pub pool_size: u32,
    pub schema: String,
    pub table_prefix: String,
    pub ssl_mode: Option<String>,
    pub ssl_root_cert: Option<String>,
    pub ssl_cert: Option<String>,
    pub ssl_key: Option<String>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::from("postgres://localhost:5432/infergate"),
            pool_size: 5,
            schema: String::from("public"),
            table_prefix: String::from("infergate_"),
            ssl_mode: None,
            ssl_root_cert: None,
            ssl_cert: None,
            ssl_key: None,
        }
    }
}

impl DbConfig {
    pub(crate) fn api_keys_table(&self) -> String {
        format!("{}.{}api_keys", self.schema, self.table_prefix)
    }

    pub(crate) fn roles_table(&self) -> String {
        format!("{}.{}roles", self.schema, self.table_prefix)
    }

    pub(crate) fn inference_logs_table(&self) -> String {
        format!("{}.{}inference_logs", self.schema, self.table_prefix)
    }

    pub(crate) fn completion_cache_table(&self) -> String {
        format!("{}.{}completion_cache", self.schema, self.table_prefix)
    }
}
