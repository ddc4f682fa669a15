//! Storage error types.

use std::fmt;

use rootproxy_core::ObjectKey;

/// Errors that can occur during storage operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    /// The requested object was not found.
    #[error("{kind} not found: {key}")]
    NotFound {
        /// The kind of object that was not found.
        kind: String,
        /// `namespace/name` of the missing object.
        key: String,
    },

    /// A conditional write carried a stale version.
    #[error("Version conflict on {key}: expected {expected}, found {actual}")]
    VersionConflict {
        /// `namespace/name` of the object.
        key: String,
        /// The version the writer read.
        expected: String,
        /// The version currently stored.
        actual: String,
    },

    /// Attempted to create an object that already exists.
    #[error("{kind} already exists: {key}")]
    AlreadyExists {
        /// The kind of object.
        kind: String,
        /// `namespace/name` of the object.
        key: String,
    },

    /// The object is malformed or of a kind the store does not know.
    #[error("Invalid resource: {message}")]
    InvalidResource {
        /// Description of why the object is invalid.
        message: String,
    },

    /// Failed to reach the storage backend.
    #[error("Connection error: {message}")]
    ConnectionError {
        /// Description of the connection error.
        message: String,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    #[must_use]
    pub fn not_found(kind: impl Into<String>, key: &ObjectKey) -> Self {
        Self::NotFound {
            kind: kind.into(),
            key: key.to_string(),
        }
    }

    #[must_use]
    pub fn version_conflict(
        key: &ObjectKey,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::VersionConflict {
            key: key.to_string(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    #[must_use]
    pub fn already_exists(kind: impl Into<String>, key: &ObjectKey) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            key: key.to_string(),
        }
    }

    #[must_use]
    pub fn invalid_resource(message: impl Into<String>) -> Self {
        Self::InvalidResource {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a version conflict error.
    #[must_use]
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// Returns `true` if this is an already exists error.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns the error category for logging.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::VersionConflict { .. } => ErrorCategory::Conflict,
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::InvalidResource { .. } => ErrorCategory::Validation,
            Self::ConnectionError { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

impl From<rootproxy_core::CoreError> for StorageError {
    fn from(err: rootproxy_core::CoreError) -> Self {
        Self::invalid_resource(err.to_string())
    }
}

/// Categories of storage errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Object not found.
    NotFound,
    /// Conflict (version or existence).
    Conflict,
    /// Validation error.
    Validation,
    /// Infrastructure/connection error.
    Infrastructure,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ObjectKey {
        ObjectKey::new("default", "root")
    }

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found("HTTPProxy", &key());
        assert_eq!(err.to_string(), "HTTPProxy not found: default/root");

        let err = StorageError::version_conflict(&key(), "1", "2");
        assert_eq!(
            err.to_string(),
            "Version conflict on default/root: expected 1, found 2"
        );

        let err = StorageError::already_exists("HTTPProxy", &key());
        assert_eq!(err.to_string(), "HTTPProxy already exists: default/root");
    }

    #[test]
    fn test_error_predicates() {
        let err = StorageError::not_found("HTTPProxy", &key());
        assert!(err.is_not_found());
        assert!(!err.is_version_conflict());
        assert!(!err.is_already_exists());

        let err = StorageError::version_conflict(&key(), "1", "2");
        assert!(!err.is_not_found());
        assert!(err.is_version_conflict());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StorageError::not_found("HTTPProxy", &key()).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            StorageError::version_conflict(&key(), "1", "2").category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            StorageError::connection_error("reset").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(ErrorCategory::NotFound.to_string(), "not_found");
    }

    #[test]
    fn test_core_error_maps_to_invalid_resource() {
        let err: StorageError = rootproxy_core::CoreError::unregistered_kind("v1", "Pod").into();
        assert_eq!(err.category(), ErrorCategory::Validation);
    }
}
