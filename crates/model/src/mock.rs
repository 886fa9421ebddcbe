use std::sync::Mutex;

use async_trait::async_trait;

use crate::backend::{GenerationParams, ModelBackend};
use crate::error::ModelError;

/// A deterministic backend for tests: returns a queue of canned responses in
/// order, falling back to a fixed default once the queue is drained. Used by
/// the extraction engine's repair-flow tests, where
/// the first call must return unparseable text and the second a
/// delimiter-wrapped JSON object.
#[derive(Debug)]
pub struct MockModelBackend {
    responses: Mutex<std::collections::VecDeque<String>>,
    default_response: String,
}

impl MockModelBackend {
    /// A mock that always returns the same response.
    #[must_use]
    pub fn always(response: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(std::collections::VecDeque::new()),
            default_response: response.into(),
        }
    }

    /// A mock that returns each response in `sequence` in order, then repeats
    /// the last one.
    #[must_use]
    pub fn sequence(sequence: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut queue: std::collections::VecDeque<String> =
        sequence.into_iter().map(Into::into).collect();
        let default_response = queue.back().cloned().unwrap_or_default();
        // The last entry stays in the queue so `sequence` and `always` behave
        // the same once drained down to one item.
        if queue.len() > 1 {
            queue.pop_back();
        } else {
            queue.clear();
        }
        Self {
            responses: Mutex::new(queue),
            default_response,
        }
    }
}

#[async_trait]
impl ModelBackend for MockModelBackend {
    async fn generate(
        &self,
        _prompt: &str,
        _params: &GenerationParams,
    ) -> Result<String, ModelError> {
        let mut queue = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        Ok(queue.pop_front().unwrap_or_else(|| self.default_response.clone()))
    }

    async fn ensure_loaded(&self) -> Result<(), ModelError> {
        Ok(())
    }
}

/// A mock backend that always fails, for exercising `model_not_loaded` /
/// backend-error paths.
#[derive(Debug)]
pub struct FailingModelBackend {
    message: String,
}

impl FailingModelBackend {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl ModelBackend for FailingModelBackend {
    async fn generate(
        &self,
        _prompt: &str,
        _params: &GenerationParams,
    ) -> Result<String, ModelError> {
        Err(ModelError::Backend(self.message.clone()))
    }

    async fn ensure_loaded(&self) -> Result<(), ModelError> {
        Err(ModelError::Backend(self.message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_repeats_same_response() {
        let backend = MockModelBackend::always("ok");
        let params = GenerationParams::default();
        assert_eq!(backend.generate("p", &params).await.unwrap(), "ok");
        assert_eq!(backend.generate("p", &params).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn sequence_drains_then_repeats_last() {
        let backend = MockModelBackend::sequence(["first", "second"]);
        let params = GenerationParams::default();
        assert_eq!(backend.generate("p", &params).await.unwrap(), "first");
        assert_eq!(backend.generate("p", &params).await.unwrap(), "second");
        assert_eq!(backend.generate("p", &params).await.unwrap(), "second");
    }

    #[tokio::test]
    async fn failing_backend_errors() {
        let backend = FailingModelBackend::new("boom");
        let params = GenerationParams::default();
        assert!(backend.generate("p", &params).await.is_err());
    }
}
