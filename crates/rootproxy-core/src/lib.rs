//! Core types shared by every rootproxy crate.
//!
//! - [`resource`]: the `HTTPProxy` object model (identity, labels, includes)
//! - [`scheme`]: explicit registry of the object kinds a store accepts
//! - [`events`]: resource change events and the broadcaster that carries them

pub mod error;
pub mod events;
pub mod resource;
pub mod scheme;

pub use error::{CoreError, Result};
pub use resource::{
    HttpProxy, HttpProxySpec, Include, ObjectKey, ObjectMeta, TypeMeta, VirtualHost,
    ROOT_PROXY_LABEL, ROOT_PROXY_NAMESPACE_LABEL,
};
pub use scheme::{GroupVersionKind, Scheme};
