//! # rootproxy-storage
//!
//! Storage abstraction for the rootproxy controller.
//!
//! This crate defines the contract a resource backend must satisfy. It holds
//! no backend itself; `rootproxy-db-memory` provides the in-memory one.
//!
//! ## Overview
//!
//! - [`ResourceStore`]: the minimal capability the reconciler needs, a point
//!   read by key and a conditional write that fails with
//!   [`StorageError::VersionConflict`] when the stored version moved on.
//! - [`ObjectStore`]: the full lifecycle surface (create, finalizer-aware
//!   delete, list) used by the event dispatcher and by tests.
//! - [`EventedStore`]: wrapper that publishes a resource event after every
//!   successful write.
//!
//! ## Example
//!
//! ```ignore
//! use rootproxy_core::ObjectKey;
//! use rootproxy_storage::{ResourceStore, StorageError};
//!
//! async fn bump_label(store: &dyn ResourceStore, key: &ObjectKey) -> Result<(), StorageError> {
//!     let mut proxy = store.get(key).await?;
//!     proxy.metadata.labels.insert("touched".into(), "true".into());
//!     // Fails with VersionConflict if someone else wrote in between.
//!     store.update(&proxy).await?;
//!     Ok(())
//! }
//! ```

mod error;
pub mod evented;
mod traits;

pub use error::{ErrorCategory, StorageError};
pub use evented::EventedStore;
pub use traits::{Deletion, ObjectStore, ResourceStore};

/// Type alias for a shared store trait object.
pub type DynStore = std::sync::Arc<dyn ResourceStore>;
