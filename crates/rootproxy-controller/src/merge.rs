//! Computing a root's next `includes` from one child.
//!
//! [`reconcile_child`] is pure apart from existence probes: it never writes.
//! A child being deleted is removed from the list. An active child is
//! appended if missing, then every entry whose referent no longer exists is
//! pruned and duplicates are collapsed. Survivors keep their relative order.

use rootproxy_core::{HttpProxy, Include};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ReconcileError;
use crate::includes::{
    Existence, ExistenceProbe, contains_include, dedup_includes, remove_include,
};

/// The next `includes` for a root and what changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub includes: Vec<Include>,
    /// `true` when `includes` differs from the root's current list.
    pub changed: bool,
    /// The child was added.
    pub appended: bool,
    /// Entries dropped because they point at the deleted child or at nothing.
    pub removed: Vec<Include>,
    /// Duplicate entries collapsed.
    pub collapsed: usize,
}

/// Merges `child` into `root.spec.includes`.
///
/// Each distinct entry is probed once. Only [`Existence::Absent`] prunes;
/// an unanswered probe keeps the entry. Returns
/// [`ReconcileError::Cancelled`] if `cancel` fires while probing.
pub async fn reconcile_child<P: ExistenceProbe + ?Sized>(
    root: &HttpProxy,
    child: &HttpProxy,
    probe: &P,
    cancel: &CancellationToken,
) -> Result<MergeOutcome, ReconcileError> {
    let child_key = child.key();
    let mut includes = root.spec.includes.clone();

    if child.is_being_deleted() {
        let dropped = remove_include(&mut includes, &child_key);
        let before = includes.len();
        let includes = dedup_includes(includes);
        let collapsed = before - includes.len();
        let removed = if dropped > 0 {
            vec![Include::from(&child_key)]
        } else {
            Vec::new()
        };

        return Ok(MergeOutcome {
            changed: dropped > 0 || collapsed > 0,
            includes,
            appended: false,
            removed,
            collapsed,
        });
    }

    let appended = !contains_include(&includes, &child_key);
    if appended {
        includes.push(Include::from(&child_key));
    }

    // Existence depends only on the key, so collapsing first probes each key once
    let before = includes.len();
    let candidates = dedup_includes(includes);
    let collapsed = before - candidates.len();

    let mut kept = Vec::with_capacity(candidates.len());
    let mut removed = Vec::new();
    for include in candidates {
        let key = include.key();
        let existence = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ReconcileError::Cancelled),
            existence = probe.probe(&key) => existence,
        };

        match existence {
            Existence::Present => kept.push(include),
            Existence::Absent => {
                debug!(include = %include, "Pruning include with no referent");
                removed.push(include);
            }
            Existence::Unknown(error) => {
                warn!(include = %include, error = %error, "Existence probe failed, keeping include");
                kept.push(include);
            }
        }
    }

    Ok(MergeOutcome {
        changed: appended || collapsed > 0 || !removed.is_empty(),
        includes: kept,
        appended,
        removed,
        collapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use async_trait::async_trait;
    use rootproxy_core::ObjectKey;
    use rootproxy_storage::{ResourceStore, StorageError};
    use time::OffsetDateTime;

    /// Answers gets from a fixed set of keys; `broken` keys fail with a connection error.
    struct FixedStore {
        present: HashSet<ObjectKey>,
        broken: HashSet<ObjectKey>,
    }

    impl FixedStore {
        fn with(names: &[&str]) -> Self {
            Self {
                present: names.iter().map(|n| ObjectKey::new("test", *n)).collect(),
                broken: HashSet::new(),
            }
        }
    }

    #[async_trait]
    impl ResourceStore for FixedStore {
        async fn get(&self, key: &ObjectKey) -> Result<HttpProxy, StorageError> {
            if self.broken.contains(key) {
                return Err(StorageError::connection_error("reset"));
            }
            if self.present.contains(key) {
                Ok(HttpProxy::new(&key.namespace, &key.name))
            } else {
                Err(StorageError::not_found("HTTPProxy", key))
            }
        }

        async fn update(&self, _proxy: &HttpProxy) -> Result<HttpProxy, StorageError> {
            Err(StorageError::internal("read only"))
        }

        fn backend_name(&self) -> &'static str {
            "fixed"
        }
    }

    fn inc(name: &str) -> Include {
        Include::new("test", name)
    }

    fn root(includes: &[&str]) -> HttpProxy {
        HttpProxy::new("test", "root").with_includes(includes.iter().map(|n| inc(n)).collect())
    }

    fn child(name: &str) -> HttpProxy {
        HttpProxy::new("test", name).with_root("root")
    }

    fn deleting(name: &str) -> HttpProxy {
        let mut proxy = child(name);
        proxy.metadata.deletion_timestamp = Some(OffsetDateTime::now_utc());
        proxy
    }

    async fn merge(root: &HttpProxy, child: &HttpProxy, store: &FixedStore) -> MergeOutcome {
        reconcile_child(root, child, store, &CancellationToken::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_active_child_is_appended() {
        let store = FixedStore::with(&["a", "child-1"]);
        let out = merge(&root(&["a"]), &child("child-1"), &store).await;

        assert!(out.changed);
        assert!(out.appended);
        assert_eq!(out.includes, vec![inc("a"), inc("child-1")]);
    }

    #[tokio::test]
    async fn test_present_child_is_unchanged() {
        let store = FixedStore::with(&["a", "child-1"]);
        let out = merge(&root(&["child-1", "a"]), &child("child-1"), &store).await;

        assert!(!out.changed);
        assert_eq!(out.includes, vec![inc("child-1"), inc("a")]);
    }

    #[tokio::test]
    async fn test_absent_entries_are_pruned() {
        let store = FixedStore::with(&["a", "child-1"]);
        let out = merge(&root(&["gone", "a", "child-1"]), &child("child-1"), &store).await;

        assert!(out.changed);
        assert!(!out.appended);
        assert_eq!(out.removed, vec![inc("gone")]);
        assert_eq!(out.includes, vec![inc("a"), inc("child-1")]);
    }

    #[tokio::test]
    async fn test_duplicates_collapse_in_first_seen_order() {
        let store = FixedStore::with(&["a", "b", "child-1"]);
        let out = merge(&root(&["b", "a", "b", "child-1", "a"]), &child("child-1"), &store).await;

        assert!(out.changed);
        assert_eq!(out.collapsed, 2);
        assert_eq!(out.includes, vec![inc("b"), inc("a"), inc("child-1")]);
    }

    #[tokio::test]
    async fn test_unknown_existence_keeps_entry() {
        let mut store = FixedStore::with(&["child-1"]);
        store.broken.insert(ObjectKey::new("test", "flaky"));
        let out = merge(&root(&["flaky", "child-1"]), &child("child-1"), &store).await;

        assert!(!out.changed);
        assert_eq!(out.includes, vec![inc("flaky"), inc("child-1")]);
    }

    #[tokio::test]
    async fn test_deleting_child_is_removed() {
        let store = FixedStore::with(&[]);
        let out = merge(&root(&["a", "child-1", "b", "child-1"]), &deleting("child-1"), &store).await;

        assert!(out.changed);
        assert_eq!(out.removed, vec![inc("child-1")]);
        // Nothing is probed on the deletion path
        assert_eq!(out.includes, vec![inc("a"), inc("b")]);
    }

    #[tokio::test]
    async fn test_deleting_absent_child_is_noop() {
        let store = FixedStore::with(&[]);
        let out = merge(&root(&["a"]), &deleting("child-1"), &store).await;

        assert!(!out.changed);
        assert_eq!(out.includes, vec![inc("a")]);
    }

    #[tokio::test]
    async fn test_deleting_child_still_dedups_survivors() {
        let store = FixedStore::with(&[]);
        let out = merge(&root(&["a", "a"]), &deleting("child-1"), &store).await;

        assert!(out.changed);
        assert_eq!(out.collapsed, 1);
        assert_eq!(out.includes, vec![inc("a")]);
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let store = FixedStore::with(&["a", "child-1"]);
        let first = merge(&root(&["a", "gone", "a"]), &child("child-1"), &store).await;
        assert!(first.changed);

        let next = HttpProxy::new("test", "root").with_includes(first.includes.clone());
        let second = merge(&next, &child("child-1"), &store).await;
        assert!(!second.changed);
        assert_eq!(second.includes, first.includes);
    }

    /// Records every key it is asked about.
    struct CountingProbe {
        seen: std::sync::Mutex<Vec<ObjectKey>>,
    }

    #[async_trait]
    impl ExistenceProbe for CountingProbe {
        async fn probe(&self, key: &ObjectKey) -> Existence {
            self.seen.lock().unwrap().push(key.clone());
            if key.name == "gone" {
                Existence::Absent
            } else {
                Existence::Present
            }
        }
    }

    #[tokio::test]
    async fn test_each_distinct_include_is_probed_once() {
        let probe = CountingProbe {
            seen: std::sync::Mutex::new(Vec::new()),
        };
        let out = reconcile_child(
            &root(&["a", "gone", "a", "gone"]),
            &child("child-1"),
            &probe,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(out.includes, vec![inc("a"), inc("child-1")]);
        assert_eq!(out.removed, vec![inc("gone")]);
        assert_eq!(
            *probe.seen.lock().unwrap(),
            vec![
                ObjectKey::new("test", "a"),
                ObjectKey::new("test", "gone"),
                ObjectKey::new("test", "child-1"),
            ]
        );
    }

    #[tokio::test]
    async fn test_cancelled_while_probing() {
        let store = FixedStore::with(&["child-1"]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = reconcile_child(&root(&[]), &child("child-1"), &store, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
