use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::resource::{HttpProxy, ObjectKey};

/// Type of resource change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceEventType {
    /// Resource was created
    Created,
    /// Resource was updated (including being marked for deletion)
    Updated,
    /// Resource was removed from the store
    Deleted,
}

impl ResourceEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceEventType::Created => "created",
            ResourceEventType::Updated => "updated",
            ResourceEventType::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for ResourceEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A change to one object in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEvent {
    pub event_type: ResourceEventType,
    pub kind: String,
    pub key: ObjectKey,
    /// Version after the change; `None` for removals.
    pub resource_version: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl ResourceEvent {
    pub fn new(
        event_type: ResourceEventType,
        kind: impl Into<String>,
        key: ObjectKey,
        resource_version: Option<String>,
    ) -> Self {
        Self {
            event_type,
            kind: kind.into(),
            key,
            resource_version,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn created(proxy: &HttpProxy) -> Self {
        Self::from_object(ResourceEventType::Created, proxy)
    }

    pub fn updated(proxy: &HttpProxy) -> Self {
        Self::from_object(ResourceEventType::Updated, proxy)
    }

    pub fn deleted(kind: impl Into<String>, key: ObjectKey) -> Self {
        Self::new(ResourceEventType::Deleted, kind, key, None)
    }

    fn from_object(event_type: ResourceEventType, proxy: &HttpProxy) -> Self {
        Self::new(
            event_type,
            &proxy.type_meta.kind,
            proxy.key(),
            proxy.metadata.resource_version.clone(),
        )
    }

    pub fn matches_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }
}
