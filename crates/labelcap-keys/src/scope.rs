//! Namespace partitions
//!
//! Every image lives under `public/{dataset}/{label}/`. Datasets and labels
//! are never materialized; they exist only as key prefixes.

use crate::error::{KeyError, NameKind};

/// Root segment shared by every key
pub const PUBLIC_ROOT: &str = "public";

/// Path delimiter of the key namespace
pub const DELIMITER: char = '/';

/// Check that a name can be used as a single namespace segment.
///
/// # Errors
/// Returns `KeyError::InvalidScope` if the name is empty, starts with `.`,
/// or contains the delimiter.
pub fn validate_name(kind: NameKind, name: &str) -> Result<(), KeyError> {
    if name.is_empty() {
        return Err(KeyError::invalid_scope(kind, name, "must not be empty"));
    }
    if name == "." || name == ".." {
        return Err(KeyError::invalid_scope(kind, name, "reserved segment"));
    }
    if name.starts_with('.') {
        return Err(KeyError::invalid_scope(kind, name, "must not start with '.'"));
    }
    if name.contains(DELIMITER) {
        return Err(KeyError::invalid_scope(kind, name, "contains delimiter"));
    }
    Ok(())
}

/// Prefix of a dataset partition: `public/{dataset}/`
///
/// An empty dataset collapses to the public root itself.
#[must_use]
pub fn dataset_prefix(dataset: &str) -> String {
    if dataset.is_empty() {
        format!("{PUBLIC_ROOT}{DELIMITER}")
    } else {
        format!("{PUBLIC_ROOT}{DELIMITER}{dataset}{DELIMITER}")
    }
}

/// Prefix of a label partition: `public/{dataset}/{label}/`
#[must_use]
pub fn label_prefix(dataset: &str, label: &str) -> String {
    format!("{}{label}{DELIMITER}", dataset_prefix(dataset))
}
