use infergate_state::StateKey;

/// Render a [`StateKey`] into a Redis key string with the given prefix.
/// Format: `prefix:kind:id`.
#[must_use]
pub fn render_key(prefix: &str, key: &StateKey) -> String {
    format!("{}:{}:{}", prefix, key.kind, key.id)
}

#[cfg(test)]
mod tests {
    use infergate_state::KeyKind;

    use super::*;

    #[test]
    fn renders_standard_key() {
        let key = StateKey::new(KeyKind::RateLimit, "abc-123");
        let rendered = render_key("infergate", &key);
        assert_eq!(rendered, "infergate:rate_limit:abc-123");
    }

    #[test]
    fn renders_custom_kind() {
        let key = StateKey::new(KeyKind::Custom("my_kind".into()), "id-1");
        let rendered = render_key("pfx", &key);
        assert_eq!(rendered, "pfx:my_kind:id-1");
    }
}
