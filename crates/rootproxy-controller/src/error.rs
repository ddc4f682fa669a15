use rootproxy_core::ObjectKey;
use rootproxy_storage::{ErrorCategory, StorageError};
use thiserror::Error;

use crate::retry::{ConflictAware, RetryError};

#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("reconcile cancelled")]
    Cancelled,

    #[error("root {root} still conflicting after {attempts} attempts")]
    ConflictRetriesExhausted {
        root: ObjectKey,
        attempts: u32,
        #[source]
        source: StorageError,
    },
}

impl ReconcileError {
    /// Folds the retry loop's result for `root` into a reconcile error.
    pub fn from_retry(root: &ObjectKey, err: RetryError<ReconcileError>) -> Self {
        match err {
            RetryError::Cancelled => Self::Cancelled,
            RetryError::Aborted(err) => err,
            RetryError::Exhausted {
                attempts,
                last: Self::Storage(source),
            } => Self::ConflictRetriesExhausted {
                root: root.clone(),
                attempts,
                source,
            },
            RetryError::Exhausted { last, .. } => last,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_not_found())
    }

    /// Category for log fields; `None` for cancellation.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Storage(e) => Some(e.category()),
            Self::ConflictRetriesExhausted { .. } => Some(ErrorCategory::Conflict),
            Self::Cancelled => None,
        }
    }
}

impl ConflictAware for ReconcileError {
    fn is_conflict(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_version_conflict())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> ObjectKey {
        ObjectKey::new("test", "root")
    }

    #[test]
    fn test_exhaustion_keeps_last_conflict() {
        let last = StorageError::version_conflict(&root(), "3", "4");
        let err = ReconcileError::from_retry(
            &root(),
            RetryError::Exhausted {
                attempts: 5,
                last: ReconcileError::Storage(last),
            },
        );

        match &err {
            ReconcileError::ConflictRetriesExhausted { attempts, source, .. } => {
                assert_eq!(*attempts, 5);
                assert!(source.is_version_conflict());
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "root test/root still conflicting after 5 attempts"
        );
        assert_eq!(err.category(), Some(ErrorCategory::Conflict));
    }

    #[test]
    fn test_aborted_passes_through() {
        let err = ReconcileError::from_retry(
            &root(),
            RetryError::Aborted(StorageError::not_found("HTTPProxy", &root()).into()),
        );
        assert!(err.is_not_found());
        assert!(!err.is_conflict());

        let err = ReconcileError::from_retry(&root(), RetryError::Cancelled);
        assert!(err.is_cancelled());
        assert!(err.category().is_none());
    }
}
