//! labelcap blob store
//!
//! The narrow object-store interface the image repository depends on, plus
//! two backends:
//!
//! - [`MemoryBlobStore`]: concurrent in-process map, for tests and scratch use
//! - [`FsBlobStore`]: keys laid out as files under a root directory
//!
//! Keys are `/`-delimited strings. Implementations hide pagination and
//! credentials from callers.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
pub mod fs;
pub mod memory;

use async_trait::async_trait;
use std::collections::BTreeSet;

pub use error::StoreError;
pub use fs::FsBlobStore;
pub use memory::{MemoryBlobStore, StoredObject};

/// Delimiter separating key segments
pub const KEY_DELIMITER: char = '/';

/// Remote object store consumed by the image repository
///
/// Every call obtains whatever credentials it needs on its own; callers
/// never see them.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Write an object, overwriting any existing one at `key`.
    async fn put(&self, key: &str, payload: &[u8], content_type: &str) -> Result<(), StoreError>;

    /// List all object keys starting with `prefix`.
    ///
    /// Order is unspecified; callers treat the result as a set.
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// One-level "directory" listing below `prefix`.
    ///
    /// Returns full common prefixes including the trailing delimiter, e.g.
    /// `public/plants/rose/` for prefix `public/plants/`.
    async fn list_common_prefixes(&self, prefix: &str) -> Result<BTreeSet<String>, StoreError>;

    /// Delete an object. Succeeds if the key does not exist.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Collect the one-level common prefixes of `keys` below `prefix`
///
/// Shared by backends that can enumerate their keys directly.
pub fn common_prefixes<'a>(
    prefix: &str,
    keys: impl IntoIterator<Item = &'a str>,
) -> BTreeSet<String> {
    keys.into_iter()
        .filter_map(|key| {
            let rest = key.strip_prefix(prefix)?;
            let end = rest.find(KEY_DELIMITER)?;
            Some(format!("{prefix}{}", &rest[..=end]))
        })
        .collect()
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
