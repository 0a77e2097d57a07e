//! Async driver for [`ViewState`]
//!
//! The controller owns the view behind a lock and calls through the
//! repository. The lock is never held across a store call: each operation
//! takes a ticket, releases the lock, awaits the store, then re-locks to
//! apply the result.

use crate::capture::CaptureEvent;
use crate::error::{LabelcapError, Result};
use crate::repository::ImageRepository;
use crate::view::{Selection, SelectionOutcome, ViewState};
use labelcap_keys::{ImageKey, InlinePayload};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Point-in-time copy of the view for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSnapshot {
    /// Active selection
    pub selection: Option<Selection>,
    /// Keys to render
    pub displayed: BTreeSet<ImageKey>,
    /// Image count, `None` while stale
    pub count: Option<usize>,
    /// Listing in flight
    pub fetching: bool,
    /// Label edited since last listing
    pub stale: bool,
    /// Labels in the active dataset
    pub labels: BTreeSet<String>,
}

/// Top-level UI controller state
#[derive(Debug, Clone)]
pub struct ViewController {
    repository: ImageRepository,
    state: Arc<Mutex<ViewState>>,
}

impl ViewController {
    /// Create controller with an empty view
    #[inline]
    #[must_use]
    pub fn new(repository: ImageRepository) -> Self {
        Self {
            repository,
            state: Arc::new(Mutex::new(ViewState::new())),
        }
    }

    /// Repository used by this controller
    #[inline]
    #[must_use]
    pub fn repository(&self) -> &ImageRepository {
        &self.repository
    }

    /// Confirm a label and load its images
    ///
    /// # Errors
    /// Listing errors for the current selection; a superseded selection
    /// returns `Ok(SelectionOutcome::Discarded)`.
    pub async fn select_label(&self, dataset: &str, label: &str) -> Result<SelectionOutcome> {
        let ticket = self.state.lock().begin_selection(dataset, label);
        let result = self.repository.list_images(dataset, label).await;
        let outcome = self.state.lock().complete_selection(ticket, result);

        match &outcome {
            Ok(SelectionOutcome::Applied { confirmed }) => {
                tracing::info!(dataset, label, confirmed, "selection loaded");
            }
            Ok(SelectionOutcome::Discarded) => {}
            Err(e) => tracing::warn!(dataset, label, error = %e, "selection listing failed"),
        }
        outcome
    }

    /// Re-list the active label without dropping pending uploads
    ///
    /// # Errors
    /// `MissingLabel` without a selection, otherwise listing errors.
    pub async fn refresh(&self) -> Result<SelectionOutcome> {
        let ticket = self
            .state
            .lock()
            .begin_refresh()
            .ok_or(LabelcapError::MissingLabel)?;
        let selection = ticket.selection().clone();
        let result = self
            .repository
            .list_images(&selection.dataset, &selection.label)
            .await;
        self.state.lock().complete_selection(ticket, result)
    }

    /// Label text edited
    #[inline]
    pub fn mark_stale(&self) {
        self.state.lock().mark_stale();
    }

    /// Discover labels of `dataset`
    ///
    /// # Errors
    /// Discovery errors; previous labels stay in place.
    pub async fn refresh_labels(&self, dataset: &str) -> Result<BTreeSet<String>> {
        let ticket = self.state.lock().begin_labels(dataset);
        let result = self.repository.list_labels(dataset).await;
        let mut state = self.state.lock();
        state.complete_labels(ticket, result)?;
        Ok(state.labels().0.clone())
    }

    /// Record an upload finished elsewhere (e.g. by a capture session)
    #[inline]
    pub fn record_upload(&self, key: ImageKey, payload: InlinePayload) -> bool {
        self.state.lock().record_upload(key, payload)
    }

    /// Apply an event reported by a capture session
    pub fn apply_capture_event(&self, event: CaptureEvent) {
        match event {
            CaptureEvent::Uploaded { key, payload } => {
                self.record_upload(key, payload);
            }
            CaptureEvent::Failed { error } => {
                tracing::warn!(error = %error, "capture upload failed");
            }
        }
    }

    /// Upload a payload into the active selection and show it immediately
    ///
    /// # Errors
    /// `MissingLabel` without a selection, otherwise upload errors.
    pub async fn capture_upload(&self, payload: InlinePayload) -> Result<ImageKey> {
        let selection = self.state.lock().require_selection()?.clone();
        let key = self
            .repository
            .upload(&payload, &selection.dataset, &selection.label)
            .await?;
        self.record_upload(key.clone(), payload);
        Ok(key)
    }

    /// Delete an image, then drop it from the view
    ///
    /// # Errors
    /// Store errors; the image stays visible.
    pub async fn remove_image(&self, key: &ImageKey) -> Result<()> {
        self.repository.remove(key).await?;
        self.state.lock().apply_removal(key);
        Ok(())
    }

    /// Copy the renderable parts of the view
    #[must_use]
    pub fn snapshot(&self) -> ViewSnapshot {
        let state = self.state.lock();
        ViewSnapshot {
            selection: state.selection().cloned(),
            displayed: state.displayed(),
            count: state.displayed_count(),
            fetching: state.is_fetching(),
            stale: state.is_stale(),
            labels: state.labels().0.clone(),
        }
    }

    /// Run a closure against the view
    pub fn with_state<R>(&self, f: impl FnOnce(&ViewState) -> R) -> R {
        f(&self.state.lock())
    }
}
