use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use crate::backend::{GenerationParams, ModelBackend};
use crate::config::HttpBackendConfig;
use crate::error::ModelError;

/// HTTP-based model backend calling an OpenAI-compatible chat completions
/// endpoint. This is the external model runtime collaborator:
/// the gateway treats it as a synchronous `generate(prompt, params) → text`
/// contract and never inspects how it produces a completion.
#[derive(Debug)]
pub struct HttpModelBackend {
    client: reqwest::Client,
    config: HttpBackendConfig,
}

impl HttpModelBackend {
    /// # Errors
    ///
    /// Returns [`ModelError::Configuration`] if the HTTP client cannot be built.
    pub fn new(config: HttpBackendConfig) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ModelError::Configuration(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl ModelBackend for HttpModelBackend {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, ModelError> {
        let mut request_body = json!({
                "model": self.config.model,
                "messages": [
                    { "role": "user", "content": prompt },
                ],
        });

        if let Some(max_new_tokens) = params.max_new_tokens {
            request_body["max_tokens"] = json!(max_new_tokens);
        }
        if let Some(temperature) = params.temperature {
            request_body["temperature"] = json!(temperature);
        }

        debug!(endpoint = %self.config.endpoint, model = %self.config.model, "sending generate request");

        let mut request = self.client.post(&self.config.endpoint).json(&request_body);
        if let Some(ref api_key) = self.config.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout(self.config.timeout_seconds)
                } else {
                    ModelError::Backend(e.to_string())
                }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "model backend returned error");
            return Err(ModelError::Backend(format!("HTTP {status}: {body}")));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ModelError::Backend(format!("invalid backend response: {e}")))?;

        response_json
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_owned)
            .ok_or_else(|| {
                ModelError::Backend(format!("unexpected response shape: {response_json}"))
        })
    }

    async fn ensure_loaded(&self) -> Result<(), ModelError> {
        // The HTTP backend has no local weights to load; readiness is
        // established the first time `generate` succeeds.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = HttpBackendConfig::new("http://localhost:8080/v1/chat/completions", "demo");
        assert_eq!(config.timeout_seconds, 30);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn config_builder() {
        let config = HttpBackendConfig::new("http://localhost:8080", "demo")
            .with_api_key("sk-test")
            .with_timeout(5);
        assert_eq!(config.timeout_seconds, 5);
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
    }
}
