//! Blob store errors

/// Failures reported by a blob store backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Store could not be reached or the request failed in transit
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Credentials were rejected or have expired
    #[error("authorization expired: {0}")]
    AuthExpired(String),

    /// Key cannot be mapped onto the backend
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl StoreError {
    /// Check if the same request may succeed later
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::AuthExpired(err.to_string()),
            _ => Self::Unavailable(err.to_string()),
        }
    }
}
