//! Dataset/label scoped image repository
//!
//! Stateless: every operation names its scope explicitly and goes straight
//! to the blob store. Failures are returned as-is; nothing is retried here.

use crate::error::{LabelcapError, Result};
use futures::{stream, StreamExt};
use labelcap_keys::{
    dataset_prefix, derive_key, derive_unpartitioned_key, label_prefix, validate_name, ImageKey,
    InlinePayload, NameKind, DELIMITER,
};
use labelcap_store::BlobStore;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Image repository over a blob store
#[derive(Clone)]
pub struct ImageRepository {
    store: Arc<dyn BlobStore>,
}

impl ImageRepository {
    /// Create repository over a store
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// Upload a captured image into `dataset`/`label`
    ///
    /// An empty dataset is a valid, degenerate partition: the key is placed
    /// directly under the public root.
    ///
    /// # Errors
    /// - `LabelcapError::MissingLabel` if `label` is empty (nothing is sent)
    /// - `LabelcapError::InvalidScope` if a name contains the delimiter
    /// - store failures, unchanged
    pub async fn upload(
        &self,
        payload: &InlinePayload,
        dataset: &str,
        label: &str,
    ) -> Result<ImageKey> {
        if label.is_empty() {
            return Err(LabelcapError::MissingLabel);
        }
        let key = if dataset.is_empty() {
            derive_unpartitioned_key(label, payload)?
        } else {
            derive_key(dataset, label, payload)?
        };

        let content_type = payload.content_type().mime();
        self.store
            .put(key.as_str(), payload.bytes(), &content_type)
            .await
            .inspect_err(|e| {
                tracing::warn!(dataset, label, key = %key, error = %e, "upload failed");
            })?;

        tracing::info!(dataset, label, key = %key, bytes = payload.len(), "uploaded image");
        Ok(key)
    }

    /// All images stored under `dataset`/`label`
    ///
    /// An empty partition yields an empty set.
    ///
    /// # Errors
    /// - `LabelcapError::InvalidScope` for an unusable label or dataset name
    /// - store failures, unchanged
    pub async fn list_images(&self, dataset: &str, label: &str) -> Result<BTreeSet<ImageKey>> {
        validate_scope(dataset, label)?;
        let prefix = label_prefix(dataset, label);
        let keys = self.store.list_by_prefix(&prefix).await?;

        // Deeper keys belong to another partition.
        let images: BTreeSet<ImageKey> = keys
            .into_iter()
            .map(ImageKey::from)
            .filter(|key| key.is_directly_under(&prefix))
            .collect();
        tracing::debug!(dataset, label, count = images.len(), "listed images");
        Ok(images)
    }

    /// Label names present in `dataset`
    ///
    /// # Errors
    /// - `LabelcapError::InvalidScope` if `dataset` is empty or unusable
    /// - store failures, unchanged
    pub async fn list_labels(&self, dataset: &str) -> Result<BTreeSet<String>> {
        validate_name(NameKind::Dataset, dataset)?;
        let prefix = dataset_prefix(dataset);
        let prefixes = self.store.list_common_prefixes(&prefix).await?;

        let labels: BTreeSet<String> = prefixes
            .iter()
            .filter_map(|p| p.strip_prefix(prefix.as_str()))
            .map(|p| p.strip_suffix(DELIMITER).unwrap_or(p))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        tracing::debug!(dataset, count = labels.len(), "listed labels");
        Ok(labels)
    }

    /// Delete an image; deleting a missing key succeeds
    ///
    /// # Errors
    /// Store failures, unchanged.
    pub async fn remove(&self, key: &ImageKey) -> Result<()> {
        self.store.delete(key.as_str()).await.inspect_err(|e| {
            tracing::warn!(key = %key, error = %e, "delete failed");
        })?;
        tracing::info!(key = %key, "removed image");
        Ok(())
    }

    /// Delete several images, at most `concurrency` at a time
    ///
    /// Every key is attempted. Results are in the order of `keys`.
    pub async fn remove_many(&self, keys: &[ImageKey], concurrency: usize) -> Vec<Result<()>> {
        stream::iter(keys)
            .map(|key| self.remove(key))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}

impl fmt::Debug for ImageRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageRepository").finish_non_exhaustive()
    }
}

fn validate_scope(dataset: &str, label: &str) -> Result<()> {
    if !dataset.is_empty() {
        validate_name(NameKind::Dataset, dataset)?;
    }
    validate_name(NameKind::Label, label)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelcap_store::{FsBlobStore, MemoryBlobStore};

    fn repo() -> (Arc<MemoryBlobStore>, ImageRepository) {
        let store = Arc::new(MemoryBlobStore::new());
        let repository = ImageRepository::new(store.clone());
        (store, repository)
    }

    fn jpeg() -> InlinePayload {
        InlinePayload::new("jpeg", vec![0xff, 0xd8, 0xff]).unwrap()
    }

    #[tokio::test]
    async fn upload_stores_under_label() {
        let (store, repository) = repo();
        let key = repository.upload(&jpeg(), "plants", "rose").await.unwrap();

        assert!(key.as_str().starts_with("public/plants/rose/"));
        assert!(key.as_str().ends_with(".jpg"));

        let object = store.get(key.as_str()).unwrap();
        assert_eq!(object.bytes, vec![0xff, 0xd8, 0xff]);
        assert_eq!(object.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn upload_without_label_sends_nothing() {
        let (store, repository) = repo();
        let result = repository.upload(&jpeg(), "plants", "").await;
        assert_eq!(result, Err(LabelcapError::MissingLabel));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn upload_without_dataset_uses_root() {
        let (_, repository) = repo();
        let key = repository.upload(&jpeg(), "", "rose").await.unwrap();
        assert!(key.as_str().starts_with("public/rose/"));

        let listed = repository.list_images("", "rose").await.unwrap();
        assert!(listed.contains(&key));
    }

    #[tokio::test]
    async fn upload_rejects_delimiter_in_label() {
        let (store, repository) = repo();
        let result = repository.upload(&jpeg(), "plants", "rose/red").await;
        assert!(matches!(result, Err(LabelcapError::InvalidScope(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn dot_prefixed_label_is_a_scope_error_on_fs_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let repository = ImageRepository::new(Arc::new(FsBlobStore::new(dir.path())));

        let result = repository.upload(&jpeg(), "plants", ".v2").await;
        assert!(matches!(result, Err(LabelcapError::InvalidScope(_))));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());

        let key = repository.upload(&jpeg(), "plants", "v2").await.unwrap();
        assert!(key.as_str().starts_with("public/plants/v2/"));
    }

    #[tokio::test]
    async fn list_images_empty_partition() {
        let (_, repository) = repo();
        let images = repository.list_images("plants", "rose").await.unwrap();
        assert!(images.is_empty());
    }

    #[tokio::test]
    async fn list_images_is_scoped() {
        let (_, repository) = repo();
        let rose = repository.upload(&jpeg(), "plants", "rose").await.unwrap();
        repository.upload(&jpeg(), "plants", "tulip").await.unwrap();
        repository.upload(&jpeg(), "garden", "rose").await.unwrap();

        let images = repository.list_images("plants", "rose").await.unwrap();
        assert_eq!(images.into_iter().collect::<Vec<_>>(), vec![rose]);
    }

    #[tokio::test]
    async fn unpartitioned_listing_skips_dataset_of_same_name() {
        let (_, repository) = repo();
        let nested = repository.upload(&jpeg(), "plants", "rose").await.unwrap();
        let direct = repository.upload(&jpeg(), "", "plants").await.unwrap();

        let listed = repository.list_images("", "plants").await.unwrap();
        assert!(!listed.contains(&nested));
        assert_eq!(listed.into_iter().collect::<Vec<_>>(), vec![direct]);

        let listed = repository.list_images("plants", "rose").await.unwrap();
        assert_eq!(listed.into_iter().collect::<Vec<_>>(), vec![nested]);
    }

    #[tokio::test]
    async fn list_labels_strips_prefix() {
        let (_, repository) = repo();
        repository.upload(&jpeg(), "plants", "rose").await.unwrap();
        repository.upload(&jpeg(), "plants", "rose").await.unwrap();
        repository.upload(&jpeg(), "plants", "tulip").await.unwrap();
        repository.upload(&jpeg(), "animals", "cat").await.unwrap();

        let labels = repository.list_labels("plants").await.unwrap();
        assert_eq!(
            labels.into_iter().collect::<Vec<_>>(),
            vec!["rose".to_string(), "tulip".to_string()]
        );
    }

    #[tokio::test]
    async fn list_labels_requires_dataset() {
        let (_, repository) = repo();
        let result = repository.list_labels("").await;
        assert!(matches!(result, Err(LabelcapError::InvalidScope(_))));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let (store, repository) = repo();
        let key = repository.upload(&jpeg(), "plants", "rose").await.unwrap();

        repository.remove(&key).await.unwrap();
        repository.remove(&key).await.unwrap();

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn remove_many_attempts_every_key() {
        let (store, repository) = repo();
        let mut keys = Vec::new();
        for _ in 0..3 {
            keys.push(repository.upload(&jpeg(), "plants", "rose").await.unwrap());
        }
        keys.push(ImageKey::from("public/plants/rose/missing.jpg"));

        let results = repository.remove_many(&keys, 2).await;
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(Result::is_ok));
        assert!(store.is_empty());
    }
}
