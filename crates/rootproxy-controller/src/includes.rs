//! Helpers over a root's `includes` list.

use std::collections::HashSet;

use async_trait::async_trait;
use rootproxy_core::{Include, ObjectKey};
use rootproxy_storage::{ResourceStore, StorageError};

/// Drops repeated entries, keyed by `"{namespace}/{name}"`. First occurrence wins.
pub fn dedup_includes(includes: Vec<Include>) -> Vec<Include> {
    let mut seen = HashSet::with_capacity(includes.len());
    includes
        .into_iter()
        .filter(|include| seen.insert(include.dedup_key()))
        .collect()
}

pub fn contains_include(includes: &[Include], key: &ObjectKey) -> bool {
    includes.iter().any(|include| include.refers_to(key))
}

/// Removes every entry pointing at `key`, returning how many were removed.
pub fn remove_include(includes: &mut Vec<Include>, key: &ObjectKey) -> usize {
    let before = includes.len();
    includes.retain(|include| !include.refers_to(key));
    before - includes.len()
}

/// Result of asking the store whether an object exists.
#[derive(Debug, Clone)]
pub enum Existence {
    Present,
    Absent,
    /// The store could not answer.
    Unknown(StorageError),
}

#[async_trait]
pub trait ExistenceProbe: Send + Sync {
    async fn probe(&self, key: &ObjectKey) -> Existence;
}

#[async_trait]
impl<S: ResourceStore + ?Sized> ExistenceProbe for S {
    async fn probe(&self, key: &ObjectKey) -> Existence {
        match self.get(key).await {
            Ok(_) => Existence::Present,
            Err(e) if e.is_not_found() => Existence::Absent,
            Err(e) => Existence::Unknown(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inc(name: &str) -> Include {
        Include::new("test", name)
    }

    #[test]
    fn test_dedup_keeps_first_seen_order() {
        let deduped = dedup_includes(vec![inc("b"), inc("a"), inc("b"), inc("c"), inc("a")]);
        assert_eq!(deduped, vec![inc("b"), inc("a"), inc("c")]);
    }

    #[test]
    fn test_dedup_distinguishes_namespaces() {
        let includes = vec![Include::new("x", "a"), Include::new("y", "a")];
        assert_eq!(dedup_includes(includes.clone()), includes);
    }

    #[test]
    fn test_contains_and_remove() {
        let key = ObjectKey::new("test", "a");
        let mut includes = vec![inc("a"), inc("b"), inc("a")];
        assert!(contains_include(&includes, &key));

        assert_eq!(remove_include(&mut includes, &key), 2);
        assert_eq!(includes, vec![inc("b")]);
        assert!(!contains_include(&includes, &key));
        assert_eq!(remove_include(&mut includes, &key), 0);
    }
}
