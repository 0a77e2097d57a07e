//! In-memory blob store

use crate::{common_prefixes, BlobStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeSet;

/// Object held by [`MemoryBlobStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Object body
    pub bytes: Vec<u8>,
    /// MIME type given at upload
    pub content_type: String,
}

/// Concurrent in-process blob store
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: DashMap<String, StoredObject>,
}

impl MemoryBlobStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a stored object
    #[must_use]
    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.get(key).map(|entry| entry.value().clone())
    }

    /// Check if an object exists
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    /// Number of stored objects
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// All keys currently stored, sorted
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, payload: &[u8], content_type: &str) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey("empty key".to_string()));
        }
        self.objects.insert(
            key.to_string(),
            StoredObject {
                bytes: payload.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        tracing::trace!(key, bytes = payload.len(), "memory put");
        Ok(())
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .objects
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn list_common_prefixes(&self, prefix: &str) -> Result<BTreeSet<String>, StoreError> {
        let keys = self.keys();
        Ok(common_prefixes(prefix, keys.iter().map(String::as_str)))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.objects.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_and_get() {
        let store = MemoryBlobStore::new();
        store
            .put("public/ds/cat/a.jpg", &[1, 2, 3], "image/jpeg")
            .await
            .unwrap();

        let object = store.get("public/ds/cat/a.jpg").unwrap();
        assert_eq!(object.bytes, vec![1, 2, 3]);
        assert_eq!(object.content_type, "image/jpeg");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn put_rejects_empty_key() {
        let store = MemoryBlobStore::new();
        let result = store.put("", &[], "image/png").await;
        assert!(matches!(result, Err(StoreError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn list_by_prefix_scopes() {
        let store = MemoryBlobStore::new();
        for key in ["public/ds/cat/a.jpg", "public/ds/cat/b.jpg", "public/ds/dog/c.jpg"] {
            store.put(key, &[0], "image/jpeg").await.unwrap();
        }

        let mut cats = store.list_by_prefix("public/ds/cat/").await.unwrap();
        cats.sort();
        assert_eq!(cats, vec!["public/ds/cat/a.jpg", "public/ds/cat/b.jpg"]);

        let none = store.list_by_prefix("public/other/").await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn list_common_prefixes_one_level() {
        let store = MemoryBlobStore::new();
        for key in ["public/ds/cat/a.jpg", "public/ds/dog/b.jpg", "public/ds2/x/c.jpg"] {
            store.put(key, &[0], "image/jpeg").await.unwrap();
        }

        let prefixes = store.list_common_prefixes("public/ds/").await.unwrap();
        assert_eq!(
            prefixes.into_iter().collect::<Vec<_>>(),
            vec!["public/ds/cat/", "public/ds/dog/"]
        );
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryBlobStore::new();
        store.put("k/a", &[0], "image/png").await.unwrap();

        store.delete("k/a").await.unwrap();
        store.delete("k/a").await.unwrap();
        store.delete("never/existed").await.unwrap();

        assert!(store.is_empty());
    }
}
