use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rootproxy_core::resource::HTTP_PROXY_KIND;
use rootproxy_core::{HttpProxy, ObjectKey, Scheme};
use rootproxy_storage::{Deletion, ObjectStore, ResourceStore, StorageError};
use time::OffsetDateTime;
use tracing::debug;

/// In-memory store backed by `DashMap`.
///
/// This storage implementation provides:
/// - Versioned objects with a store-wide monotonic version counter
/// - Atomic conditional writes (compare and swap under the shard lock)
/// - Finalizer-aware deletion
/// - Kind validation against the [`Scheme`] it was constructed with
#[derive(Debug)]
pub struct InMemoryStore {
    data: DashMap<ObjectKey, HttpProxy>,
    version_counter: AtomicU64,
    scheme: Arc<Scheme>,
}

impl InMemoryStore {
    pub fn new(scheme: Arc<Scheme>) -> Self {
        Self {
            data: DashMap::new(),
            version_counter: AtomicU64::new(1),
            scheme,
        }
    }

    pub fn scheme(&self) -> &Arc<Scheme> {
        &self.scheme
    }

    /// Generates the next version token.
    fn next_version(&self) -> String {
        self.version_counter
            .fetch_add(1, Ordering::SeqCst)
            .to_string()
    }

    fn validate(&self, proxy: &HttpProxy) -> Result<(), StorageError> {
        self.scheme.check(&proxy.type_meta)?;
        if proxy.metadata.name.is_empty() || proxy.metadata.namespace.is_empty() {
            return Err(StorageError::invalid_resource(
                "metadata.name and metadata.namespace are required",
            ));
        }
        Ok(())
    }

    /// Inserts objects as-is, keeping deletion timestamps and finalizers.
    ///
    /// Missing uids are generated and every object gets a fresh version.
    /// Intended for loading manifests at startup and for test fixtures.
    pub fn seed(&self, objects: Vec<HttpProxy>) -> Result<usize, StorageError> {
        let mut inserted = 0;
        for mut proxy in objects {
            self.validate(&proxy)?;
            let key = proxy.key();
            match self.data.entry(key.clone()) {
                Entry::Occupied(_) => {
                    return Err(StorageError::already_exists(HTTP_PROXY_KIND, &key));
                }
                Entry::Vacant(vacant) => {
                    if proxy.metadata.uid.is_none() {
                        proxy.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
                    }
                    proxy.metadata.resource_version = Some(self.next_version());
                    proxy.metadata.generation = proxy.metadata.generation.max(1);
                    vacant.insert(proxy);
                    inserted += 1;
                }
            }
        }
        debug!(count = inserted, "Seeded store");
        Ok(inserted)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<HttpProxy, StorageError> {
        self.data
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::not_found(HTTP_PROXY_KIND, key))
    }

    async fn update(&self, proxy: &HttpProxy) -> Result<HttpProxy, StorageError> {
        self.validate(proxy)?;
        let key = proxy.key();

        // The shard stays write-locked from the version check to the swap.
        let mut occupied = match self.data.entry(key.clone()) {
            Entry::Occupied(occupied) => occupied,
            Entry::Vacant(_) => return Err(StorageError::not_found(HTTP_PROXY_KIND, &key)),
        };
        let current = occupied.get();

        let actual = current.metadata.resource_version.clone().unwrap_or_default();
        if let Some(expected) = proxy.resource_version() {
            if expected != actual {
                return Err(StorageError::version_conflict(&key, expected, actual));
            }
        }

        let mut stored = proxy.clone();
        stored.metadata.uid = current.metadata.uid.clone();
        stored.metadata.deletion_timestamp = current.metadata.deletion_timestamp;
        stored.metadata.generation = if stored.spec == current.spec {
            current.metadata.generation
        } else {
            current.metadata.generation + 1
        };
        stored.metadata.resource_version = Some(self.next_version());

        // Clearing the last finalizer of a deleting object completes the delete
        if stored.is_being_deleted() && stored.metadata.finalizers.is_empty() {
            occupied.remove();
            debug!(key = %key, "Removed object after its last finalizer was dropped");
            return Ok(stored);
        }
        *occupied.get_mut() = stored.clone();

        Ok(stored)
    }

    fn backend_name(&self) -> &'static str {
        "in-memory-dashmap"
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn create(&self, proxy: &HttpProxy) -> Result<HttpProxy, StorageError> {
        self.validate(proxy)?;
        let key = proxy.key();

        match self.data.entry(key.clone()) {
            Entry::Occupied(_) => Err(StorageError::already_exists(HTTP_PROXY_KIND, &key)),
            Entry::Vacant(vacant) => {
                let mut stored = proxy.clone();
                stored.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
                stored.metadata.resource_version = Some(self.next_version());
                stored.metadata.generation = 1;
                stored.metadata.deletion_timestamp = None;
                vacant.insert(stored.clone());
                Ok(stored)
            }
        }
    }

    async fn delete(&self, key: &ObjectKey) -> Result<Deletion, StorageError> {
        match self.data.entry(key.clone()) {
            Entry::Vacant(_) => Err(StorageError::not_found(HTTP_PROXY_KIND, key)),
            Entry::Occupied(mut occupied) => {
                if occupied.get().metadata.finalizers.is_empty() {
                    occupied.remove();
                    return Ok(Deletion::Removed);
                }
                let proxy = occupied.get_mut();
                if proxy.metadata.deletion_timestamp.is_none() {
                    proxy.metadata.deletion_timestamp = Some(OffsetDateTime::now_utc());
                    proxy.metadata.resource_version = Some(self.next_version());
                }
                Ok(Deletion::Retained(proxy.clone()))
            }
        }
    }

    async fn remove_finalizer(
        &self,
        key: &ObjectKey,
        finalizer: &str,
    ) -> Result<Deletion, StorageError> {
        match self.data.entry(key.clone()) {
            Entry::Vacant(_) => Err(StorageError::not_found(HTTP_PROXY_KIND, key)),
            Entry::Occupied(mut occupied) => {
                let proxy = occupied.get_mut();
                let before = proxy.metadata.finalizers.len();
                proxy.metadata.finalizers.retain(|f| f != finalizer);
                if proxy.metadata.finalizers.len() == before {
                    return Ok(Deletion::Retained(proxy.clone()));
                }

                if proxy.is_being_deleted() && proxy.metadata.finalizers.is_empty() {
                    occupied.remove();
                    return Ok(Deletion::Removed);
                }
                proxy.metadata.resource_version = Some(self.next_version());
                Ok(Deletion::Retained(proxy.clone()))
            }
        }
    }

    async fn list(&self, namespace: Option<&str>) -> Result<Vec<HttpProxy>, StorageError> {
        let mut objects: Vec<HttpProxy> = self
            .data
            .iter()
            .filter(|entry| namespace.is_none_or(|ns| entry.key().namespace == ns))
            .map(|entry| entry.value().clone())
            .collect();
        objects.sort_by_key(HttpProxy::key);
        Ok(objects)
    }
}
