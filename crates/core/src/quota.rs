use serde::{Deserialize, Serialize};

/// Per-key monthly consumption ledger.
///
/// The monthly boundary is a deployment concern: an external job resets
/// `quota_used` to 0 at the start of each billing period. The gateway itself
/// never resets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct QuotaCell {
    pub quota_used: i64,
    /// `None` means unlimited.
    pub quota_monthly: Option<i64>,
}

impl QuotaCell {
    #[must_use]
    pub fn new(quota_used: i64, quota_monthly: Option<i64>) -> Self {
        Self {
            quota_used,
            quota_monthly,
        }
    }

    /// Whether consuming one more unit is permitted. Quota is consumed on
    /// *attempt*, not success: callers check-then-increment before doing any
    /// work, never refunding on later failure.
    #[must_use]
    pub fn has_remaining(&self) -> bool {
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
    fn unlimited_quota_always_has_remaining() {
        assert!(QuotaCell::new(1_000_000, None).has_remaining());
    }

    #[test]
    fn exhausted_quota_reports_no_remaining() {
        assert!(!QuotaCell::new(5, Some(5)).has_remaining());
        assert!(QuotaCell::new(4, Some(5)).has_remaining());
    }
}
