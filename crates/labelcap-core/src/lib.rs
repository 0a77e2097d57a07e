//! labelcap core
//!
//! Organizes captured images in a blob store under a two-level
//! dataset → label namespace and keeps a client-side view of the active
//! label coherent with the store:
//! - Uploads, listings, label discovery and deletion scoped per call
//! - Reconciliation of confirmed (listed) and pending (just uploaded) images
//! - Discarding of listings that finish after the user picked another label
//! - Timed capture sessions with a bounded upload pool
//!
//! # Example
//!
//! ```rust,ignore
//! use labelcap_core::{ImageRepository, ViewController};
//! use labelcap_store::MemoryBlobStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), labelcap_core::LabelcapError> {
//! let repository = ImageRepository::new(Arc::new(MemoryBlobStore::new()));
//! let controller = ViewController::new(repository);
//!
//! controller.select_label("plants", "rose").await?;
//! let key = controller.capture_upload(payload).await?;
//! assert!(controller.snapshot().displayed.contains(&key));
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod capture;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod pool;
pub mod repository;
pub mod view;

// Re-exports for convenience
pub use capture::{CaptureEvent, CaptureSession, FrameSource};
pub use config::LabelcapConfig;
pub use controller::{ViewController, ViewSnapshot};
pub use error::{ConfigError, LabelcapError, Result};
pub use pool::{UploadPool, UploadProgress};
pub use repository::ImageRepository;
pub use view::{
    LabelsTicket, Selection, SelectionOutcome, SelectionTicket, Thumbnail, ViewState,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with labelcap core
    pub use crate::{
        CaptureSession, FrameSource, ImageRepository, LabelcapConfig, LabelcapError,
        SelectionOutcome, ViewController, ViewState,
    };
    pub use labelcap_keys::{ImageKey, InlinePayload};
    pub use labelcap_store::BlobStore;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
