//! Reconciler for child proxies.
//!
//! Given a child key, [`ChildReconciler::reconcile`] reads the child, finds
//! the root named by its `root-proxy` label in the child's own namespace and
//! drives that root's `includes` toward the merged state. The
//! read-merge-write cycle runs under [`retry_on_conflict`], so every retry
//! starts from a fresh read of the root.

use std::future::Future;
use std::sync::Arc;

use rootproxy_core::{HttpProxy, ObjectKey, ROOT_PROXY_NAMESPACE_LABEL};
use rootproxy_storage::ResourceStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::ReconcileError;
use crate::merge::reconcile_child;
use crate::retry::{Backoff, retry_on_conflict};

/// What a successful reconcile did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The child no longer exists.
    ChildGone,
    /// The child has no `root-proxy` label.
    NotAMember,
    /// The root's includes were already correct; nothing was written.
    Unchanged { root: ObjectKey },
    /// The root was written once with new includes.
    Updated {
        root: ObjectKey,
        resource_version: Option<String>,
        includes: usize,
    },
}

impl ReconcileOutcome {
    pub fn wrote(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }
}

/// Races `fut` against `cancel`.
async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Result<T, ReconcileError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReconcileError::Cancelled),
        out = fut => Ok(out),
    }
}

pub struct ChildReconciler<S: ResourceStore + ?Sized> {
    store: Arc<S>,
    backoff: Backoff,
}

impl<S: ResourceStore + ?Sized> ChildReconciler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            backoff: Backoff::default_retry(),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Brings the root of `child_key` in line with the child's current state.
    ///
    /// A missing child is not an error. A missing root fails the reconcile
    /// without retrying; only version conflicts are retried, and running out
    /// of attempts yields [`ReconcileError::ConflictRetriesExhausted`].
    #[instrument(skip(self, child_key, cancel), fields(child = %child_key, backend = self.store.backend_name()))]
    pub async fn reconcile(
        &self,
        child_key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let child = match cancellable(cancel, self.store.get(child_key)).await? {
            Ok(child) => child,
            Err(e) if e.is_not_found() => {
                debug!("Child no longer exists");
                return Ok(ReconcileOutcome::ChildGone);
            }
            Err(e) => return Err(e.into()),
        };

        let Some(root_key) = child.root_key() else {
            debug!("Child has no root-proxy label");
            return Ok(ReconcileOutcome::NotAMember);
        };

        if let Some(ns) = child.metadata.labels.get(ROOT_PROXY_NAMESPACE_LABEL) {
            if *ns != child.metadata.namespace {
                warn!(
                    label_namespace = %ns,
                    root = %root_key,
                    "Ignoring root-proxy-namespace label, roots resolve in the child's namespace"
                );
            }
        }

        let outcome = retry_on_conflict(&self.backoff, cancel, |attempt| {
            self.sync_root(&root_key, &child, attempt, cancel)
        })
        .await
        .map_err(|e| ReconcileError::from_retry(&root_key, e))?;

        match &outcome {
            ReconcileOutcome::Updated {
                root,
                resource_version,
                includes,
            } => info!(
                root = %root,
                resource_version = resource_version.as_deref().unwrap_or(""),
                includes = *includes,
                deleting = child.is_being_deleted(),
                "Updated root includes"
            ),
            ReconcileOutcome::Unchanged { root } => {
                debug!(root = %root, "Root includes already up to date")
            }
            _ => {}
        }

        Ok(outcome)
    }

    /// One read-merge-write cycle against the root.
    async fn sync_root(
        &self,
        root_key: &ObjectKey,
        child: &HttpProxy,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let root = cancellable(cancel, self.store.get(root_key)).await??;
        debug!(
            root = %root_key,
            attempt,
            resource_version = root.resource_version().unwrap_or(""),
            "Read root"
        );

        let merged = reconcile_child(&root, child, self.store.as_ref(), cancel).await?;
        if !merged.changed {
            return Ok(ReconcileOutcome::Unchanged {
                root: root_key.clone(),
            });
        }

        let mut next = root;
        next.spec.includes = merged.includes;
        let stored = cancellable(cancel, self.store.update(&next)).await??;

        Ok(ReconcileOutcome::Updated {
            root: root_key.clone(),
            includes: stored.spec.includes.len(),
            resource_version: stored.metadata.resource_version,
        })
    }
}

impl<S: ResourceStore + ?Sized> std::fmt::Debug for ChildReconciler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildReconciler")
            .field("backend", &self.store.backend_name())
            .field("backoff", &self.backoff)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootproxy_core::{Include, Scheme};
    use rootproxy_db_memory::{InMemoryStore, ObjectStore};

    fn store() -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::new(Arc::new(Scheme::with_http_proxy())))
    }

    #[tokio::test]
    async fn test_missing_child_is_noop() {
        let reconciler = ChildReconciler::new(store());
        let outcome = reconciler
            .reconcile(&ObjectKey::new("test", "ghost"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::ChildGone);
    }

    #[tokio::test]
    async fn test_unlabelled_child_is_noop() {
        let store = store();
        let root = store
            .create(&HttpProxy::new("test", "root"))
            .await
            .unwrap();
        store.create(&HttpProxy::new("test", "plain")).await.unwrap();

        let reconciler = ChildReconciler::new(store.clone());
        let outcome = reconciler
            .reconcile(&ObjectKey::new("test", "plain"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::NotAMember);
        let after = store.get(&root.key()).await.unwrap();
        assert_eq!(after.resource_version(), root.resource_version());
    }

    #[tokio::test]
    async fn test_second_reconcile_writes_nothing() {
        let store = store();
        store.create(&HttpProxy::new("test", "root")).await.unwrap();
        let key = store
            .create(&HttpProxy::new("test", "child-1").with_root("root"))
            .await
            .unwrap()
            .key();

        let reconciler = ChildReconciler::new(store.clone());
        let cancel = CancellationToken::new();
        let first = reconciler.reconcile(&key, &cancel).await.unwrap();
        assert!(first.wrote());

        let version = store
            .get(&ObjectKey::new("test", "root"))
            .await
            .unwrap()
            .metadata
            .resource_version;
        let second = reconciler.reconcile(&key, &cancel).await.unwrap();
        assert_eq!(
            second,
            ReconcileOutcome::Unchanged {
                root: ObjectKey::new("test", "root")
            }
        );

        let root = store.get(&ObjectKey::new("test", "root")).await.unwrap();
        assert_eq!(root.metadata.resource_version, version);
        assert_eq!(root.spec.includes, vec![Include::new("test", "child-1")]);
    }

    #[tokio::test]
    async fn test_missing_root_is_not_found() {
        let store = store();
        let key = store
            .create(&HttpProxy::new("test", "child-1").with_root("nope"))
            .await
            .unwrap()
            .key();

        let err = ChildReconciler::new(store)
            .reconcile(&key, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_works_through_trait_object() {
        let store = store();
        store.create(&HttpProxy::new("test", "root")).await.unwrap();
        let key = store
            .create(&HttpProxy::new("test", "child-1").with_root("root"))
            .await
            .unwrap()
            .key();

        let dyn_store: rootproxy_storage::DynStore = store;
        let outcome = ChildReconciler::new(dyn_store)
            .reconcile(&key, &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.wrote());
    }
}
