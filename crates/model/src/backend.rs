use async_trait::async_trait;

use crate::error::ModelError;

/// Sampling parameters that influence a single `generate` call. These are
/// exactly the inputs folded into the cache fingerprint.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationParams {
    pub max_new_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

/// A single model backend: a synchronous `generate(prompt, params) → text`
/// contract plus the hook the Model Registry uses to implement the load-mode
/// state machine. The model runtime behind this trait is an
/// external collaborator; this crate only defines the seam.
#[async_trait]
pub trait ModelBackend: Send + Sync + std::fmt::Debug {
    /// Produce a completion for `prompt` under `params`.
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, ModelError>;

    /// Ensure backend resources (weights, connections) are ready. Idempotent:
    /// a backend that is already loaded treats this as a no-op.
    async fn ensure_loaded(&self) -> Result<(), ModelError>;
}
