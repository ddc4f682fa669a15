//! Event broadcaster for resource change events.
//!
//! Wraps a tokio broadcast channel. Receivers that fall more than the buffer
//! size behind observe `RecvError::Lagged` and are expected to resync.

use std::sync::Arc;
use tokio::sync::broadcast;

use super::types::ResourceEvent;
use crate::resource::{HttpProxy, ObjectKey};

/// Default buffer size for the broadcast channel.
const DEFAULT_BUFFER_SIZE: usize = 1024;

#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<ResourceEvent>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Send an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event (0 if none).
    pub fn send(&self, event: ResourceEvent) -> usize {
        self.sender.send(event).unwrap_or_default()
    }

    pub fn send_created(&self, proxy: &HttpProxy) -> usize {
        self.send(ResourceEvent::created(proxy))
    }

    pub fn send_updated(&self, proxy: &HttpProxy) -> usize {
        self.send(ResourceEvent::updated(proxy))
    }

    pub fn send_deleted(&self, kind: impl Into<String>, key: ObjectKey) -> usize {
        self.send(ResourceEvent::deleted(kind, key))
    }

    /// Events sent before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ResourceEventType;

    #[test]
    fn test_broadcaster_no_subscribers() {
        let broadcaster = EventBroadcaster::new();
        assert!(!broadcaster.has_subscribers());
        let count = broadcaster.send_created(&HttpProxy::new("default", "root"));
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_broadcaster_send_receive() {
        let broadcaster = EventBroadcaster::new();
        let mut receiver = broadcaster.subscribe();

        broadcaster.send_created(&HttpProxy::new("test", "child-1"));

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event_type, ResourceEventType::Created);
        assert_eq!(event.key, ObjectKey::new("test", "child-1"));
    }

    #[tokio::test]
    async fn test_broadcaster_multiple_subscribers() {
        let broadcaster = EventBroadcaster::new_shared();
        let mut receiver1 = broadcaster.subscribe();
        let mut receiver2 = broadcaster.clone().subscribe();

        let count = broadcaster.send_deleted("HTTPProxy", ObjectKey::new("default", "x"));
        assert_eq!(count, 2);

        assert_eq!(
            receiver1.recv().await.unwrap().event_type,
            ResourceEventType::Deleted
        );
        assert_eq!(
            receiver2.recv().await.unwrap().event_type,
            ResourceEventType::Deleted
        );
    }

    #[tokio::test]
    async fn test_slow_receiver_lags() {
        let broadcaster = EventBroadcaster::with_capacity(2);
        let mut receiver = broadcaster.subscribe();

        for i in 0..5 {
            broadcaster.send_updated(&HttpProxy::new("default", format!("p{i}")));
        }

        assert!(matches!(
            receiver.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }
}
