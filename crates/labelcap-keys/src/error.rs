//! Error types for key derivation

use std::fmt::{self, Display, Formatter};

/// Which part of a scope a name belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    /// Top-level dataset partition
    Dataset,
    /// Label partition within a dataset
    Label,
}

impl Display for NameKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dataset => f.write_str("dataset"),
            Self::Label => f.write_str("label"),
        }
    }
}

/// Errors produced by the key codec
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// Dataset or label name cannot partition the namespace
    #[error("invalid {kind} name '{name}': {reason}")]
    InvalidScope {
        kind: NameKind,
        name: String,
        reason: &'static str,
    },

    /// Inline payload is not a `data:image/<subtype>;base64,` URL
    #[error("malformed image payload: {0}")]
    MalformedPayload(String),
}

impl KeyError {
    /// Create an invalid scope error
    #[inline]
    #[must_use]
    pub fn invalid_scope(kind: NameKind, name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidScope {
            kind,
            name: name.into(),
            reason,
        }
    }

    /// Check if this is a scope error
    #[inline]
    #[must_use]
    pub fn is_invalid_scope(&self) -> bool {
        matches!(self, Self::InvalidScope { .. })
    }
}
