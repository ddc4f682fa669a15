//! Loading `HTTPProxy` manifests from JSON.
//!
//! A manifest file holds a single object, a JSON array of objects, or a
//! `List` document with an `items` array.

use std::path::Path;

use rootproxy_core::HttpProxy;
use rootproxy_storage::StorageError;
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestDocument {
    List { items: Vec<HttpProxy> },
    Many(Vec<HttpProxy>),
    One(Box<HttpProxy>),
}

/// Parses manifest text into objects, in document order.
pub fn parse_manifests(input: &str) -> Result<Vec<HttpProxy>, StorageError> {
    let document: ManifestDocument = serde_json::from_str(input)
        .map_err(|e| StorageError::invalid_resource(format!("invalid manifest: {e}")))?;

    Ok(match document {
        ManifestDocument::List { items } => items,
        ManifestDocument::Many(items) => items,
        ManifestDocument::One(item) => vec![*item],
    })
}

/// Reads and parses a manifest file.
pub async fn load_manifests(path: impl AsRef<Path>) -> Result<Vec<HttpProxy>, StorageError> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        StorageError::internal(format!("failed to read {}: {e}", path.display()))
    })?;
    let objects = parse_manifests(&content)?;
    tracing::info!(path = %path.display(), count = objects.len(), "Loaded manifests");
    Ok(objects)
}
