//! Resource change events.
//!
//! Stores wrapped in an evented adapter publish a [`ResourceEvent`] after
//! every successful write. The controller subscribes and turns each event
//! into a reconcile request for the affected key.
//!
//! ```text
//!   EventedStore ──▶ EventBroadcaster ──▶ Controller (work queue) ──▶ Reconciler
//! ```

pub mod broadcaster;
pub mod types;

pub use broadcaster::EventBroadcaster;
pub use types::{ResourceEvent, ResourceEventType};
