//! EventedStore - a store wrapper that emits events after writes.
//!
//! Every successful write is followed by a [`ResourceEvent`] on the
//! broadcaster. Reads never emit.
//!
//! # Example
//!
//! ```ignore
//! use rootproxy_core::events::EventBroadcaster;
//! use rootproxy_storage::EventedStore;
//!
//! let broadcaster = EventBroadcaster::new_shared();
//! let store = EventedStore::new(InMemoryStore::new(scheme), broadcaster.clone());
//!
//! // Subscribers see a "created" event for default/root.
//! store.create(&HttpProxy::new("default", "root")).await?;
//! ```
//!
//! [`ResourceEvent`]: rootproxy_core::events::ResourceEvent

use std::sync::Arc;

use async_trait::async_trait;
use rootproxy_core::events::{EventBroadcaster, ResourceEvent};
use rootproxy_core::resource::HTTP_PROXY_KIND;
use rootproxy_core::{HttpProxy, ObjectKey};
use tracing::debug;

use crate::error::StorageError;
use crate::traits::{Deletion, ObjectStore, ResourceStore};

/// A store wrapper that emits events after successful writes.
///
/// Events are emitted **after** the inner write succeeds, so every event
/// corresponds to a durable change.
pub struct EventedStore<S: ObjectStore> {
    inner: S,
    broadcaster: Arc<EventBroadcaster>,
}

impl<S: ObjectStore> EventedStore<S> {
    pub fn new(inner: S, broadcaster: Arc<EventBroadcaster>) -> Self {
        Self { inner, broadcaster }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    fn emit(&self, event: ResourceEvent) {
        if !self.broadcaster.has_subscribers() {
            return;
        }
        let event_type = event.event_type;
        let key = event.key.clone();
        let count = self.broadcaster.send(event);
        debug!(
            event = %event_type,
            key = %key,
            subscribers = count,
            "Emitted resource event"
        );
    }

    fn emit_deletion(&self, key: &ObjectKey, deletion: &Deletion) {
        match deletion {
            Deletion::Retained(proxy) => self.emit(ResourceEvent::updated(proxy)),
            Deletion::Removed => self.emit(ResourceEvent::deleted(HTTP_PROXY_KIND, key.clone())),
        }
    }
}

#[async_trait]
impl<S: ObjectStore> ResourceStore for EventedStore<S> {
    async fn get(&self, key: &ObjectKey) -> Result<HttpProxy, StorageError> {
        self.inner.get(key).await
    }

    async fn update(&self, proxy: &HttpProxy) -> Result<HttpProxy, StorageError> {
        let stored = self.inner.update(proxy).await?;
        if stored.is_being_deleted() && stored.metadata.finalizers.is_empty() {
            self.emit(ResourceEvent::deleted(HTTP_PROXY_KIND, stored.key()));
        } else {
            self.emit(ResourceEvent::updated(&stored));
        }
        Ok(stored)
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for EventedStore<S> {
    async fn create(&self, proxy: &HttpProxy) -> Result<HttpProxy, StorageError> {
        let stored = self.inner.create(proxy).await?;
        self.emit(ResourceEvent::created(&stored));
        Ok(stored)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<Deletion, StorageError> {
        let deletion = self.inner.delete(key).await?;
        self.emit_deletion(key, &deletion);
        Ok(deletion)
    }

    async fn remove_finalizer(
        &self,
        key: &ObjectKey,
        finalizer: &str,
    ) -> Result<Deletion, StorageError> {
        let deletion = self.inner.remove_finalizer(key, finalizer).await?;
        self.emit_deletion(key, &deletion);
        Ok(deletion)
    }

    async fn list(&self, namespace: Option<&str>) -> Result<Vec<HttpProxy>, StorageError> {
        self.inner.list(namespace).await
    }
}

impl<S: ObjectStore> std::fmt::Debug for EventedStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventedStore")
            .field("backend", &self.inner.backend_name())
            .field("subscriber_count", &self.broadcaster.subscriber_count())
            .finish()
    }
}
