//! Filesystem blob store
//!
//! Each key maps onto a file below the store root, with key segments as
//! directories. Writes go to a hidden temp file first and are renamed into
//! place, so listings never observe a partially written object. The content
//! type is not persisted; the key's extension carries it.

use crate::{BlobStore, StoreError, KEY_DELIMITER};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const TEMP_MARKER: char = '.';

const PRUNE_RETRIES: u32 = 3;

/// Blob store backed by a directory tree
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create store rooted at `root` (created lazily on first write)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key (or key prefix) onto a path below the root
    ///
    /// A trailing delimiter is allowed so prefixes resolve to directories.
    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let trimmed = key.strip_suffix(KEY_DELIMITER).unwrap_or(key);
        if trimmed.is_empty() {
            return Ok(self.root.clone());
        }
        if trimmed.contains('\\') {
            return Err(StoreError::InvalidKey(format!("backslash in key: {key}")));
        }

        let mut path = self.root.clone();
        for segment in trimmed.split(KEY_DELIMITER) {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(StoreError::InvalidKey(format!("bad segment in key: {key}")));
            }
            if segment.starts_with(TEMP_MARKER) {
                return Err(StoreError::InvalidKey(format!("hidden segment in key: {key}")));
            }
            path.push(segment);
        }
        Ok(path)
    }

    /// Key of a file found below the root
    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let segments: Option<Vec<&str>> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect();
        Some(segments?.join("/"))
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let parent = path
            .parent()
            .ok_or_else(|| StoreError::InvalidKey("key must have a parent".to_string()))?;
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| StoreError::InvalidKey("bad file name".to_string()))?;
        let tmp = parent.join(format!(
            "{TEMP_MARKER}{file_name}.tmp.{}",
            uuid::Uuid::new_v4().simple()
        ));

        {
            let mut f = create_temp(parent, &tmp).await?;
            f.write_all(bytes).await?;
            f.sync_all().await?;
        }

        if let Err(err) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        Ok(())
    }

    /// Remove now-empty directories between `dir` and the root
    async fn prune_empty_dirs(&self, mut dir: PathBuf) {
        while dir != self.root && dir.starts_with(&self.root) {
            // remove_dir fails on non-empty directories, which ends the walk
            if fs::remove_dir(&dir).await.is_err() {
                break;
            }
            if !dir.pop() {
                break;
            }
        }
    }
}

/// Create `parent` and open a fresh temp file in it
///
/// A concurrent delete may prune `parent` between the two steps; both are
/// retried. Once the temp file exists the directory is no longer empty and
/// cannot be pruned.
async fn create_temp(parent: &Path, tmp: &Path) -> std::io::Result<fs::File> {
    let mut retries = 0;
    loop {
        let opened = async {
            fs::create_dir_all(parent).await?;
            fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(tmp)
                .await
        }
        .await;
        match opened {
            Err(err) if err.kind() == ErrorKind::NotFound && retries < PRUNE_RETRIES => {
                retries += 1;
                tracing::debug!(dir = %parent.display(), "parent pruned during write, retrying");
            }
            other => return other,
        }
    }
}

async fn read_dir_if_exists(dir: &Path) -> Result<Option<fs::ReadDir>, StoreError> {
    match fs::read_dir(dir).await {
        Ok(entries) => Ok(Some(entries)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Split a prefix into its directory part and trailing partial segment
fn split_prefix(prefix: &str) -> (&str, &str) {
    match prefix.rfind(KEY_DELIMITER) {
        Some(idx) => (&prefix[..=idx], &prefix[idx + 1..]),
        None => ("", prefix),
    }
}

async fn contains_object(dir: PathBuf) -> Result<bool, StoreError> {
    let mut stack = vec![dir];
    while let Some(dir) = stack.pop() {
        let Some(mut entries) = read_dir_if_exists(&dir).await? else {
            continue;
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(TEMP_MARKER) {
                continue;
            }
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, payload: &[u8], content_type: &str) -> Result<(), StoreError> {
        if key.ends_with(KEY_DELIMITER) {
            return Err(StoreError::InvalidKey(format!("key ends with delimiter: {key}")));
        }
        let path = self.path_for(key)?;
        if path == self.root {
            return Err(StoreError::InvalidKey("empty key".to_string()));
        }
        self.write_atomic(&path, payload).await?;
        tracing::trace!(key, content_type, bytes = payload.len(), "fs put");
        Ok(())
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let (dir_part, _) = split_prefix(prefix);
        let start = self.path_for(dir_part)?;

        let mut keys = Vec::new();
        let mut stack = vec![start];
        while let Some(dir) = stack.pop() {
            let Some(mut entries) = read_dir_if_exists(&dir).await? else {
                continue;
            };
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_name().to_string_lossy().starts_with(TEMP_MARKER) {
                    continue;
                }
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    stack.push(path);
                } else if file_type.is_file() {
                    if let Some(key) = self.key_for(&path) {
                        if key.starts_with(prefix) {
                            keys.push(key);
                        }
                    }
                }
            }
        }
        Ok(keys)
    }

    async fn list_common_prefixes(&self, prefix: &str) -> Result<BTreeSet<String>, StoreError> {
        let (dir_part, partial) = split_prefix(prefix);
        let dir = self.path_for(dir_part)?;

        let mut prefixes = BTreeSet::new();
        let Some(mut entries) = read_dir_if_exists(&dir).await? else {
            return Ok(prefixes);
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with(TEMP_MARKER) || !name.starts_with(partial) {
                continue;
            }
            if entry.file_type().await?.is_dir() && contains_object(entry.path()).await? {
                prefixes.insert(format!("{dir_part}{name}{KEY_DELIMITER}"));
            }
        }
        Ok(prefixes)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if path == self.root {
            return Err(StoreError::InvalidKey("empty key".to_string()));
        }
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        }
        if let Some(parent) = path.parent() {
            self.prune_empty_dirs(parent.to_path_buf()).await;
        }
        Ok(())
    }
}
