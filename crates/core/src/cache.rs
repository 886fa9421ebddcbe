use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which tier of the completion cache served or stored a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    Fast,
    Durable,
}

/// A stored completion. A write to the durable tier is the invariant that
/// survives process restarts; the fast tier may be evicted at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub tier: CacheTier,
}
