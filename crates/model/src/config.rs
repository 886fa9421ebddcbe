/// Configuration for the HTTP-based model backend: an OpenAI-compatible
/// chat completions endpoint.
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Endpoint (e.g. `https://api.openai.com/v1/chat/completions`).
    pub endpoint: String,
    /// Upstream model name to request.
    pub model: String,
    /// Bearer token, if the upstream requires one.
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl HttpBackendConfig {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            timeout_seconds: 30,
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }
}
