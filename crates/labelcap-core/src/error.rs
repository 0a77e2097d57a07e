//! Error types for labelcap core
//!
//! Local validation failures (`InvalidScope`, `MissingLabel`) are never
//! retried. Remote failures (`StoreUnavailable`, `AuthExpired`) are passed
//! through unchanged so the caller can decide whether to retry or
//! re-authenticate.

use labelcap_keys::KeyError;
use labelcap_store::StoreError;
use std::path::PathBuf;

/// Main labelcap error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelcapError {
    /// Dataset or label name missing or unusable where required
    #[error("invalid scope: {0}")]
    InvalidScope(String),

    /// Upload attempted without a label
    #[error("no label selected")]
    MissingLabel,

    /// Captured payload could not be interpreted as an image
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Blob store unreachable or request failed
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Store credentials rejected
    #[error("authorization expired: {0}")]
    AuthExpired(String),

    /// Store refused the key
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Capture session failed
    #[error("capture failed: {0}")]
    Capture(String),
}

impl LabelcapError {
    /// Check if the operation may succeed when retried unchanged
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// Check if the user has to re-authenticate first
    #[inline]
    #[must_use]
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::AuthExpired(_))
    }

    /// Check if the failure was detected locally, before touching the store
    #[inline]
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::InvalidScope(_) | Self::MissingLabel | Self::MalformedPayload(_)
        )
    }
}

impl From<KeyError> for LabelcapError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::InvalidScope { .. } => Self::InvalidScope(err.to_string()),
            KeyError::MalformedPayload(msg) => Self::MalformedPayload(msg),
        }
    }
}

impl From<StoreError> for LabelcapError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
            StoreError::AuthExpired(msg) => Self::AuthExpired(msg),
            StoreError::InvalidKey(msg) => Self::InvalidKey(msg),
        }
    }
}

impl From<ConfigError> for LabelcapError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid value: {0}")]
    Invalid(String),
}

/// Result alias for labelcap operations
pub type Result<T, E = LabelcapError> = std::result::Result<T, E>;
