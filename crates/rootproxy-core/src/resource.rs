//! The `HTTPProxy` object model.
//!
//! Roots and children are the same type. A child joins a root by carrying the
//! [`ROOT_PROXY_LABEL`] label; the root records its members in
//! [`HttpProxySpec::includes`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{CoreError, Result};

/// Label on a child naming the root it wants to join (same namespace).
pub const ROOT_PROXY_LABEL: &str = "root-proxy";

/// Label some producers set next to [`ROOT_PROXY_LABEL`].
///
/// Roots are always resolved in the child's own namespace, so this label is
/// read only to warn when it disagrees.
pub const ROOT_PROXY_NAMESPACE_LABEL: &str = "root-proxy-namespace";

pub const HTTP_PROXY_API_VERSION: &str = "projectcontour.io/v1";
pub const HTTP_PROXY_KIND: &str = "HTTPProxy";

/// Identity of an object: `(namespace, name)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for ObjectKey {
    type Err = CoreError;

    /// Parses `"namespace/name"`.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self::new(ns, name))
            }
            _ => Err(CoreError::invalid_key(s)),
        }
    }
}

/// A membership entry in a root's `includes` list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Include {
    pub name: String,
    pub namespace: String,
}

impl Include {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// The object this entry points at.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    /// Dedup key, `"{namespace}/{name}"`.
    pub fn dedup_key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    pub fn refers_to(&self, key: &ObjectKey) -> bool {
        self.name == key.name && self.namespace == key.namespace
    }
}

impl From<&ObjectKey> for Include {
    fn from(key: &ObjectKey) -> Self {
        Self::new(&key.namespace, &key.name)
    }
}

impl fmt::Display for Include {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    pub api_version: String,
    pub kind: String,
}

impl Default for TypeMeta {
    fn default() -> Self {
        Self {
            api_version: HTTP_PROXY_API_VERSION.to_string(),
            kind: HTTP_PROXY_KIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    /// Assigned by the store on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Opaque version token; the store rejects writes whose token is stale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default)]
    pub generation: u64,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub deletion_timestamp: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualHost {
    pub fqdn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpProxySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtualhost: Option<VirtualHost>,
    #[serde(default)]
    pub includes: Vec<Include>,
}

/// An `HTTPProxy` object, root or child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpProxy {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: HttpProxySpec,
}

impl HttpProxy {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_meta: TypeMeta::default(),
            metadata: ObjectMeta {
                name: name.into(),
                namespace: namespace.into(),
                ..Default::default()
            },
            spec: HttpProxySpec::default(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    /// Marks this object as a child of the root `root_name`.
    pub fn with_root(self, root_name: impl Into<String>) -> Self {
        self.with_label(ROOT_PROXY_LABEL, root_name)
    }

    pub fn with_includes(mut self, includes: Vec<Include>) -> Self {
        self.spec.includes = includes;
        self
    }

    pub fn with_virtualhost(mut self, fqdn: impl Into<String>) -> Self {
        self.spec.virtualhost = Some(VirtualHost { fqdn: fqdn.into() });
        self
    }

    pub fn with_finalizer(mut self, finalizer: impl Into<String>) -> Self {
        self.metadata.finalizers.push(finalizer.into());
        self
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.metadata.namespace, &self.metadata.name)
    }

    /// Name of the root this object wants to join, if any.
    pub fn root_name(&self) -> Option<&str> {
        self.metadata.labels.get(ROOT_PROXY_LABEL).map(String::as_str)
    }

    /// Key of the root this object wants to join. Always in this object's namespace.
    pub fn root_key(&self) -> Option<ObjectKey> {
        self.root_name()
            .map(|root| ObjectKey::new(&self.metadata.namespace, root))
    }

    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    pub fn resource_version(&self) -> Option<&str> {
        self.metadata.resource_version.as_deref()
    }
}
