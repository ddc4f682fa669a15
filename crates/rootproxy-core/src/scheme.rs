//! Registry of the object kinds a store accepts.
//!
//! A `Scheme` is built once during startup and handed to the store
//! constructor. Nothing here is global.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{CoreError, Result};
use crate::resource::{HTTP_PROXY_KIND, TypeMeta};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// `HTTPProxy` in `projectcontour.io/v1`.
    pub fn http_proxy() -> Self {
        Self::new("projectcontour.io", "v1", HTTP_PROXY_KIND)
    }

    /// Splits an `apiVersion` (`group/version`, or bare `version` for the core group).
    pub fn from_type_meta(type_meta: &TypeMeta) -> Self {
        let (group, version) = match type_meta.api_version.split_once('/') {
            Some((group, version)) => (group, version),
            None => ("", type_meta.api_version.as_str()),
        };
        Self::new(group, version, &type_meta.kind)
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.api_version(), self.kind)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scheme {
    kinds: BTreeSet<GroupVersionKind>,
}

impl Scheme {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scheme with `HTTPProxy` registered.
    pub fn with_http_proxy() -> Self {
        let mut scheme = Self::new();
        scheme.kinds.insert(GroupVersionKind::http_proxy());
        scheme
    }

    pub fn register(&mut self, gvk: GroupVersionKind) -> Result<()> {
        let name = gvk.to_string();
        if !self.kinds.insert(gvk) {
            return Err(CoreError::KindAlreadyRegistered(name));
        }
        tracing::debug!(kind = %name, "Registered kind");
        Ok(())
    }

    pub fn recognizes(&self, type_meta: &TypeMeta) -> bool {
        self.kinds.contains(&GroupVersionKind::from_type_meta(type_meta))
    }

    /// Errors with `UnregisteredKind` when `type_meta` is not registered.
    pub fn check(&self, type_meta: &TypeMeta) -> Result<()> {
        if self.recognizes(type_meta) {
            Ok(())
        } else {
            Err(CoreError::unregistered_kind(
                &type_meta.api_version,
                &type_meta.kind,
            ))
        }
    }

    pub fn kinds(&self) -> impl Iterator<Item = &GroupVersionKind> {
        self.kinds.iter()
    }
}
