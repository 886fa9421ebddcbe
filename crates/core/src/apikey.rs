use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An opaque caller identity. The key string itself is a secret: it is never
/// logged, never stored raw, and compared only by its SHA-256 hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiKey {
    /// SHA-256 hex digest of the raw key, used as the lookup identity.
    pub key_hash: String,
    pub role: String,
    pub active: bool,
    /// `None` means unlimited.
    pub quota_monthly: Option<i64>,
    pub quota_used: i64,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    /// Hash a raw API key the same way at registration and at lookup time.
    #[must_use]
    pub fn hash(raw: &str) -> String {
        let digest = Sha256::digest(raw.as_bytes());
        hex::encode(digest)
    }

    #[must_use]
    pub fn new(raw_key: &str, role: impl Into<String>, quota_monthly: Option<i64>) -> Self {
        Self {
            key_hash: Self::hash(raw_key),
            role: role.into(),
            active: true,
            quota_monthly,
            quota_used: 0,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn has_quota_remaining(&self) -> bool {
        match self.quota_monthly {
            None => true,
            Some(cap) => self.quota_used < cap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_never_the_raw_key() {
        let a = ApiKey::hash("sk-live-abc");
        let b = ApiKey::hash("sk-live-abc");
        assert_eq!(a, b);
        assert_ne!(a, "sk-live-abc");
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn unlimited_quota_always_has_remaining() {
        let key = ApiKey::new("k", "standard", None);
        assert!(key.has_quota_remaining());
    }

    #[test]
    fn exhausted_quota_reports_no_remaining() {
        let mut key = ApiKey::new("k", "standard", Some(1));
        key.quota_used = 1;
        assert!(!key.has_quota_remaining());
    }
}
