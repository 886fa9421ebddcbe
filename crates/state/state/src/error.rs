use thiserror::Error;

/// Errors returned by a [`crate::store::StateStore`] implementation.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}
