//! In-memory resource store for rootproxy.
//!
//! This crate provides an implementation of the `ResourceStore` and
//! `ObjectStore` traits from `rootproxy-storage`, backed by a sharded
//! `dashmap::DashMap`. Conditional writes compare and swap under the shard
//! lock, so concurrent writers to one object are serialized and all but one
//! observe a version conflict.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rootproxy_core::{HttpProxy, Scheme};
//! use rootproxy_db_memory::InMemoryStore;
//! use rootproxy_storage::ObjectStore;
//!
//! let store = InMemoryStore::new(Arc::new(Scheme::with_http_proxy()));
//! let root = store.create(&HttpProxy::new("default", "root")).await?;
//! assert_eq!(root.resource_version(), Some("1"));
//! ```

pub mod manifest;
pub mod storage;

pub use rootproxy_storage::{ObjectStore, ResourceStore, StorageError};

pub use manifest::{load_manifests, parse_manifests};
pub use storage::InMemoryStore;
