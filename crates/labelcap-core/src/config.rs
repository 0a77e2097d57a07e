//! labelcap configuration
//!
//! Loaded from TOML; every field has a default so a partial file is valid.
//!
//! ```toml
//! store_root = "/var/lib/labelcap"
//! capture_interval_ms = 300
//! max_concurrent_uploads = 4
//! log_filter = "labelcap_core=debug,info"
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelcapConfig {
    /// Root directory of the filesystem blob store
    pub store_root: PathBuf,
    /// Delay between captured frames
    pub capture_interval_ms: u64,
    /// Upper bound on uploads in flight
    pub max_concurrent_uploads: usize,
    /// Stop a capture session after this many frames
    pub max_frames: Option<u64>,
    /// Default tracing filter when no env override is set
    pub log_filter: String,
}

impl LabelcapConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With store root
    #[inline]
    #[must_use]
    pub fn with_store_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.store_root = root.into();
        self
    }

    /// With capture interval
    #[inline]
    #[must_use]
    pub fn with_capture_interval(mut self, interval: Duration) -> Self {
        self.capture_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With max concurrent uploads
    #[inline]
    #[must_use]
    pub fn with_max_concurrent_uploads(mut self, max: usize) -> Self {
        self.max_concurrent_uploads = max;
        self
    }

    /// With frame limit
    #[inline]
    #[must_use]
    pub fn with_max_frames(mut self, frames: Option<u64>) -> Self {
        self.max_frames = frames;
        self
    }

    /// Capture interval as a duration
    #[inline]
    #[must_use]
    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for a zero interval or zero upload limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "capture_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrent_uploads == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_uploads must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` or `ConfigError::Invalid`.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// Returns `ConfigError::Io` if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

impl Default for LabelcapConfig {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from("labelcap-data"),
            capture_interval_ms: 300,
            max_concurrent_uploads: 4,
            max_frames: None,
            log_filter: "info".to_string(),
        }
    }
}
