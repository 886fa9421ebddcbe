use sha2::{Digest, Sha256};

/// A deterministic key over the inputs that influence a model's output.
/// Equality of fingerprint implies output equivalence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute a fingerprint over `(model_id, prompt, max_new_tokens,
    /// temperature)`. Callers that add sampling parameters beyond these four
    /// must fold them into `extra` so two requests that could produce
    /// different output never collide.
    #[must_use]
    pub fn compute(
        model_id: &str,
        prompt: &str,
        max_new_tokens: Option<u32>,
        temperature: Option<f64>,
        extra: &[&str],
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(model_id.as_bytes());
        hasher.update(b"\0");
        hasher.update(prompt.as_bytes());
        hasher.update(b"\0");
        hasher.update(max_new_tokens.map_or_else(String::new, |v| v.to_string()).as_bytes());
        hasher.update(b"\0");
        // Bit-pattern, not decimal formatting, so -0.0/0.0 and formatting
        // differences never desync two otherwise-identical requests.
        hasher.update(
            temperature
                .map(f64::to_bits)
                .unwrap_or_default()
                .to_be_bytes(),
        );
        for e in extra {
            hasher.update(b"\0");
            hasher.update(e.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
