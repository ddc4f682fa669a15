//! Storage traits.

use async_trait::async_trait;
use rootproxy_core::{HttpProxy, ObjectKey};

use crate::error::StorageError;

/// Point reads and conditional writes.
///
/// This is everything the reconciler is allowed to do to the store.
/// Implementations must be thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// async fn exists(store: &dyn ResourceStore, key: &ObjectKey) -> Result<bool, StorageError> {
///     match store.get(key).await {
///         Ok(_) => Ok(true),
///         Err(e) if e.is_not_found() => Ok(false),
///         Err(e) => Err(e),
///     }
/// }
/// ```
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Reads an object by key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no object is stored under `key`.
    async fn get(&self, key: &ObjectKey) -> Result<HttpProxy, StorageError>;

    /// Writes `proxy` if its `metadata.resource_version` still matches the
    /// stored version. Returns the stored object with its new version.
    ///
    /// An object without a resource version is written unconditionally.
    /// The uid and deletion timestamp are owned by the store and are kept
    /// from the stored copy. Dropping the last finalizer of an object that is
    /// being deleted removes it; the returned copy is its final state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the object does not exist.
    /// Returns `StorageError::VersionConflict` if the version is stale.
    async fn update(&self, proxy: &HttpProxy) -> Result<HttpProxy, StorageError>;

    /// Returns the name of this storage backend for logging.
    fn backend_name(&self) -> &'static str;
}

/// Result of a delete or finalizer removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deletion {
    /// The object is still stored (finalizers remain, or it was never marked for deletion).
    Retained(HttpProxy),
    /// The object is gone from the store.
    Removed,
}

/// Full object lifecycle on top of [`ResourceStore`].
#[async_trait]
pub trait ObjectStore: ResourceStore {
    /// Stores a new object, assigning its uid and first version.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the key is taken.
    /// Returns `StorageError::InvalidResource` for unregistered kinds.
    async fn create(&self, proxy: &HttpProxy) -> Result<HttpProxy, StorageError>;

    /// Deletes an object.
    ///
    /// Objects with finalizers only get a deletion timestamp and stay
    /// readable until the last finalizer is removed.
    async fn delete(&self, key: &ObjectKey) -> Result<Deletion, StorageError>;

    /// Removes one finalizer. An object already marked for deletion is
    /// removed once its finalizer list is empty.
    async fn remove_finalizer(
        &self,
        key: &ObjectKey,
        finalizer: &str,
    ) -> Result<Deletion, StorageError>;

    /// Lists objects, optionally restricted to one namespace, ordered by key.
    async fn list(&self, namespace: Option<&str>) -> Result<Vec<HttpProxy>, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time checks that the traits are object-safe
    fn _assert_store_object_safe(_: &dyn ResourceStore) {}

    fn _assert_object_store_object_safe(_: &dyn ObjectStore) {}
}
