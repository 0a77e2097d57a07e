//! Storage keys for captured images
//!
//! Provides [`ImageKey`] and the functions that derive and decompose keys of
//! the form `public/{dataset}/{label}/{id}.{extension}`.

use crate::error::{KeyError, NameKind};
use crate::payload::InlinePayload;
use crate::scope::{label_prefix, validate_name, DELIMITER, PUBLIC_ROOT};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use uuid::Uuid;

/// Fully-qualified key of a stored image
///
/// Keys are opaque strings once they come back from a listing; the
/// constructors here only guarantee the layout for keys this crate derives.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageKey(String);

impl ImageKey {
    /// Wrap a key string as returned by the blob store
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key as stored
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key relative to the public root, for renderers resolving against it
    #[inline]
    #[must_use]
    pub fn relative(&self) -> &str {
        strip_public_prefix(&self.0)
    }

    /// Check if the key lives under a partition prefix
    #[inline]
    #[must_use]
    pub fn is_under(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    /// Check if the key names an object directly below `prefix`
    ///
    /// Unlike [`is_under`](Self::is_under), keys in nested partitions do
    /// not match.
    #[must_use]
    pub fn is_directly_under(&self, prefix: &str) -> bool {
        self.0
            .strip_prefix(prefix)
            .is_some_and(|rest| !rest.is_empty() && !rest.contains(DELIMITER))
    }

    /// Decompose into its namespace parts
    #[inline]
    #[must_use]
    pub fn parts(&self) -> Option<KeyParts> {
        parse_key(&self.0)
    }

    /// Consume into the underlying string
    #[inline]
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for ImageKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ImageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for ImageKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for ImageKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// Namespace parts of a derived key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParts {
    /// Dataset partition (`None` for unpartitioned keys)
    pub dataset: Option<String>,
    /// Label partition
    pub label: String,
    /// Generated identifier
    pub id: String,
    /// File extension
    pub extension: String,
}

/// Derive a fresh key for a payload inside a (dataset, label) scope
///
/// # Errors
/// Returns `KeyError::InvalidScope` if either name is empty or cannot be a
/// single namespace segment.
pub fn derive_key(
    dataset: &str,
    label: &str,
    payload: &InlinePayload,
) -> Result<ImageKey, KeyError> {
    validate_name(NameKind::Dataset, dataset)?;
    validate_name(NameKind::Label, label)?;
    Ok(key_under(&label_prefix(dataset, label), payload))
}

/// Derive a fresh key directly under the public root: `public/{label}/{id}.{ext}`
///
/// Used when no dataset has been chosen.
///
/// # Errors
/// Returns `KeyError::InvalidScope` if the label is not a valid segment.
pub fn derive_unpartitioned_key(
    label: &str,
    payload: &InlinePayload,
) -> Result<ImageKey, KeyError> {
    validate_name(NameKind::Label, label)?;
    Ok(key_under(&label_prefix("", label), payload))
}

fn key_under(prefix: &str, payload: &InlinePayload) -> ImageKey {
    let id = Uuid::new_v4();
    ImageKey(format!("{prefix}{id}.{}", payload.content_type().extension()))
}

/// Remove a leading `public/` segment; no-op if absent
#[inline]
#[must_use]
pub fn strip_public_prefix(key: &str) -> &str {
    key.strip_prefix(PUBLIC_ROOT)
        .and_then(|rest| rest.strip_prefix(DELIMITER))
        .unwrap_or(key)
}

/// Decompose a key produced by [`derive_key`] or [`derive_unpartitioned_key`]
///
/// Returns `None` for keys outside the public namespace or with a different
/// layout.
#[must_use]
pub fn parse_key(key: &str) -> Option<KeyParts> {
    let relative = key.strip_prefix(PUBLIC_ROOT)?.strip_prefix(DELIMITER)?;
    let segments: Vec<&str> = relative.split(DELIMITER).collect();

    let (dataset, label, file) = match segments.as_slice() {
        [dataset, label, file] => (Some(*dataset), *label, *file),
        [label, file] => (None, *label, *file),
        _ => return None,
    };

    if dataset.is_some_and(str::is_empty) || label.is_empty() {
        return None;
    }

    let (id, extension) = file.split_once('.')?;
    if id.is_empty() || extension.is_empty() {
        return None;
    }

    Some(KeyParts {
        dataset: dataset.map(str::to_string),
        label: label.to_string(),
        id: id.to_string(),
        extension: extension.to_string(),
    })
}
