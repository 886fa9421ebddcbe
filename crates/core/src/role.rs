use serde::{Deserialize, Serialize};

/// A named classification carrying the requests-per-minute cap used by the
/// Rate Limiter. Operators may define roles beyond `admin`/`standard` in
/// configuration; this type only fixes the two names the gateway treats
/// specially (`admin` bypasses the `/v1/admin/*` role check).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Role {
    pub name: String,
    pub requests_per_minute: u32,
}

impl Role {
    #[must_use]
    pub fn new(name: impl Into<String>, requests_per_minute: u32) -> Self {
        Self {
            name: name.into(),
            requests_per_minute,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.name == "admin"
    }
}

impl Default for Role {
    /// The `standard` role with a conservative default cap; deployments are
    /// expected to override this from configuration.
    fn default() -> Self {
        Self::new("standard", 60)
    }
}
