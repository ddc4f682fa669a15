use thiserror::Error;

/// Core error types for rootproxy objects.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Kind already registered: {0}")]
    KindAlreadyRegistered(String),

    #[error("Unregistered kind: {api_version}/{kind}")]
    UnregisteredKind { api_version: String, kind: String },
}

impl CoreError {
    /// Create a new InvalidKey error
    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::InvalidKey(key.into())
    }

    /// Create a new UnregisteredKind error
    pub fn unregistered_kind(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::UnregisteredKind {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
