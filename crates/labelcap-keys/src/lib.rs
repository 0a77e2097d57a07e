//! labelcap key codec
//!
//! Pure mapping between a (dataset, label) scope and storage keys in the
//! public image namespace.
//!
//! # Core Concepts
//!
//! - [`ImageKey`]: Fully-qualified key `public/{dataset}/{label}/{id}.{ext}`
//! - [`InlinePayload`]: Self-describing captured image (content type + bytes)
//! - [`ContentType`]: Image MIME subtype and its file extension
//! - [`derive_key`]: Fresh key for a payload inside a scope
//! - [`dataset_prefix`] / [`label_prefix`]: Partition prefixes used for listing
//!
//! # Example
//!
//! ```rust,ignore
//! use labelcap_keys::{derive_key, InlinePayload};
//!
//! let payload = InlinePayload::parse("data:image/jpeg;base64,/9j/4AAQ")?;
//! let key = derive_key("plants", "rose", &payload)?;
//! assert!(key.as_str().starts_with("public/plants/rose/"));
//! assert!(key.as_str().ends_with(".jpg"));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
mod error;
mod key;
mod payload;
mod scope;

// Re-exports
pub use error::{KeyError, NameKind};
pub use key::{
    derive_key, derive_unpartitioned_key, parse_key, strip_public_prefix, ImageKey, KeyParts,
};
pub use payload::{ContentType, InlinePayload};
pub use scope::{dataset_prefix, label_prefix, validate_name, DELIMITER, PUBLIC_ROOT};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
