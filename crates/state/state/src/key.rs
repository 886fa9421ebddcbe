use serde::{Deserialize, Serialize};

/// The kind of state being stored. The gateway has no multi-tenant namespace
///; a [`StateKey`] is a flat `kind:id` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    /// Rate Limiter window counter, one per API key.
    RateLimit,
    /// Completion Cache fast tier entry, one per fingerprint.
    Cache,
    /// Completion Cache single-flight coalescing marker.
    InFlight,
    Custom(String),
}

impl KeyKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::Cache => "cache",
            Self::InFlight => "in_flight",
            Self::Custom(s) => s.as_str(),
        }
    }
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key used to address entries in a [`crate::store::StateStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey {
    pub kind: KeyKind,
    pub id: String,
}

impl StateKey {
    #[must_use]
    pub fn new(kind: KeyKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    /// Canonical string representation: `kind:id`.
    #[must_use]
    pub fn canonical(&self) -> String {
        format!("{}:{}", self.kind, self.id)
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_format() {
        let key = StateKey::new(KeyKind::RateLimit, "abc123");
        assert_eq!(key.canonical(), "rate_limit:abc123");
    }

    #[test]
    fn custom_kind_as_str() {
        assert_eq!(KeyKind::Custom("foo".into()).as_str(), "foo");
    }
}
