//! Keeps root `HTTPProxy` includes in sync with their labelled children.
//!
//! A child joins a root by carrying the `root-proxy` label; the root lists
//! its members in `spec.includes`. This crate holds the pieces that keep the
//! two consistent:
//!
//! - [`merge`]: computes a root's next includes from one child
//! - [`retry`]: re-runs read-merge-write cycles that lose a version race
//! - [`reconciler`]: the per-child reconcile built from the two above
//! - [`dispatcher`] and [`queue`]: turn store events into reconciles
//! - [`config`], [`observability`], [`health`]: process plumbing for the binary

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod health;
pub mod includes;
pub mod merge;
pub mod observability;
pub mod queue;
pub mod reconciler;
pub mod retry;

pub use config::AppConfig;
pub use dispatcher::{Controller, ControllerSettings};
pub use error::ReconcileError;
pub use health::build_app;
pub use includes::{Existence, ExistenceProbe, contains_include, dedup_includes, remove_include};
pub use merge::{MergeOutcome, reconcile_child};
pub use reconciler::{ChildReconciler, ReconcileOutcome};
pub use retry::{Backoff, ConflictAware, RetryError, retry_on_conflict};
