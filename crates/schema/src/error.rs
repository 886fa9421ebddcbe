use thiserror::Error;

/// Errors from loading or validating against a named JSON Schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema '{0}' not found")]
    NotFound(String),

    #[error("schema '{schema_id}' failed to load: {reason}")]
    LoadFailed { schema_id: String, reason: String },
}

impl SchemaError {
    #[must_use]
    pub fn schema_id(&self) -> &str {
        match self {
            Self::NotFound(id) | Self::LoadFailed { schema_id: id,.. } => id,
        }
    }
}
