use thiserror::Error;

/// Errors raised by a [`crate::backend::ModelBackend`] or the registry that
/// owns it.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model '{0}' is not loaded")]
    NotLoaded(String),

    #[error("model '{0}' is unknown")]
    Unknown(String),

    #[error("backend request failed: {0}")]
    Backend(String),

    #[error("backend request timed out after {0}s")]
    Timeout(u64),

    #[error("configuration error: {0}")]
    Configuration(String),
}
