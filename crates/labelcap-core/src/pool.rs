//! Bounded upload pool
//!
//! Caps the number of uploads in flight. `submit` waits for a free slot
//! before issuing, so a producer faster than the network is slowed down
//! instead of piling up requests.

use crate::capture::CaptureEvent;
use crate::error::{LabelcapError, Result};
use crate::repository::ImageRepository;
use labelcap_keys::{ImageKey, InlinePayload};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

/// Upload counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadProgress {
    /// Uploads handed to the store
    pub issued: u64,
    /// Uploads the store accepted
    pub completed: u64,
    /// Uploads the store rejected
    pub failed: u64,
}

impl UploadProgress {
    /// Uploads not finished yet
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.issued.saturating_sub(self.completed + self.failed)
    }

    /// Human-readable status for the capture widget
    #[must_use]
    pub fn status_line(&self) -> String {
        if self.issued == 0 {
            return "Waiting for capture...".to_string();
        }
        if self.failed == 0 {
            format!("Uploaded {} of {}", self.completed, self.issued)
        } else {
            format!(
                "Uploaded {} of {} ({} failed)",
                self.completed, self.issued, self.failed
            )
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    issued: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Semaphore-bounded upload spawner
#[derive(Debug, Clone)]
pub struct UploadPool {
    repository: ImageRepository,
    max_concurrent: usize,
    permits: Arc<Semaphore>,
    counters: Arc<Counters>,
    events: Option<mpsc::UnboundedSender<CaptureEvent>>,
}

impl UploadPool {
    /// Create pool allowing `max_concurrent` uploads at once (at least one)
    #[must_use]
    pub fn new(repository: ImageRepository, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            repository,
            max_concurrent,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            counters: Arc::new(Counters::default()),
            events: None,
        }
    }

    /// Report every finished upload on `events`
    #[must_use]
    pub fn with_events(mut self, events: mpsc::UnboundedSender<CaptureEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Issue an upload once a slot is free
    ///
    /// # Errors
    /// `LabelcapError::Capture` if the pool has been closed.
    pub async fn submit(
        &self,
        payload: InlinePayload,
        dataset: &str,
        label: &str,
    ) -> Result<JoinHandle<Result<ImageKey>>> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LabelcapError::Capture("upload pool closed".to_string()))?;
        self.counters.issued.fetch_add(1, Ordering::Relaxed);

        let repository = self.repository.clone();
        let counters = self.counters.clone();
        let events = self.events.clone();
        let dataset = dataset.to_string();
        let label = label.to_string();

        Ok(tokio::spawn(async move {
            let _permit = permit;
            let result = repository.upload(&payload, &dataset, &label).await;
            match &result {
                Ok(key) => {
                    counters.completed.fetch_add(1, Ordering::Relaxed);
                    if let Some(events) = events {
                        let _ = events.send(CaptureEvent::Uploaded {
                            key: key.clone(),
                            payload,
                        });
                    }
                }
                Err(error) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    if let Some(events) = events {
                        let _ = events.send(CaptureEvent::Failed {
                            error: error.clone(),
                        });
                    }
                }
            }
            result
        }))
    }

    /// Uploads currently holding a slot
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.permits.available_permits()
    }

    /// Configured slot count
    #[inline]
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Current counters
    #[must_use]
    pub fn progress(&self) -> UploadProgress {
        UploadProgress {
            issued: self.counters.issued.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Wait until every issued upload has finished
    ///
    /// # Errors
    /// `LabelcapError::Capture` if the pool has been closed.
    pub async fn drain(&self) -> Result<()> {
        let all = u32::try_from(self.max_concurrent).unwrap_or(u32::MAX);
        let _all = self
            .permits
            .acquire_many(all)
            .await
            .map_err(|_| LabelcapError::Capture("upload pool closed".to_string()))?;
        Ok(())
    }
}
