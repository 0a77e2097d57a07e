//! Timed capture sessions
//!
//! A session snapshots a [`FrameSource`] on a fixed interval and uploads each
//! frame into one (dataset, label) scope through an [`UploadPool`]. The scope
//! is fixed when the session starts and cannot change until it stops.

use crate::config::LabelcapConfig;
use crate::error::{LabelcapError, Result};
use crate::pool::{UploadPool, UploadProgress};
use crate::repository::ImageRepository;
use crate::view::Selection;
use labelcap_keys::{validate_name, ImageKey, InlinePayload, NameKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Camera (or anything else) producing still frames on demand
pub trait FrameSource: Send + Sync + 'static {
    /// Current frame, or `None` if the device is not ready
    fn snapshot(&self) -> Option<InlinePayload>;
}

/// Result of one captured frame's upload
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// Frame stored under `key`
    Uploaded {
        /// Key the frame was stored under
        key: ImageKey,
        /// Frame as captured, for inline rendering
        payload: InlinePayload,
    },
    /// Frame could not be stored
    Failed {
        /// Upload failure
        error: LabelcapError,
    },
}

/// Running capture session
#[derive(Debug)]
pub struct CaptureSession {
    selection: Selection,
    pool: UploadPool,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<u64>,
}

impl CaptureSession {
    /// Start capturing into `dataset`/`label`
    ///
    /// Must be called inside a tokio runtime. Upload results are reported on
    /// the returned channel.
    ///
    /// # Errors
    /// - `LabelcapError::MissingLabel` if `label` is empty
    /// - `LabelcapError::InvalidScope` for unusable names
    /// - `LabelcapError::Config` for an invalid configuration
    pub fn start(
        repository: ImageRepository,
        source: Arc<dyn FrameSource>,
        dataset: &str,
        label: &str,
        config: &LabelcapConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<CaptureEvent>)> {
        if label.is_empty() {
            return Err(LabelcapError::MissingLabel);
        }
        validate_name(NameKind::Label, label)?;
        if !dataset.is_empty() {
            validate_name(NameKind::Dataset, dataset)?;
        }
        config.validate()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let pool =
            UploadPool::new(repository, config.max_concurrent_uploads).with_events(events_tx);
        let selection = Selection::new(dataset, label);
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(run_capture(
            source,
            pool.clone(),
            selection.clone(),
            config.capture_interval(),
            config.max_frames,
            stop_rx,
        ));

        tracing::info!(
            dataset,
            label,
            interval_ms = config.capture_interval_ms,
            max_concurrent = config.max_concurrent_uploads,
            "capture started"
        );
        Ok((
            Self {
                selection,
                pool,
                stop_tx,
                task,
            },
            events_rx,
        ))
    }

    /// Scope frames are uploaded into
    #[inline]
    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Current upload counters
    #[inline]
    #[must_use]
    pub fn progress(&self) -> UploadProgress {
        self.pool.progress()
    }

    /// Status text for the capture widget
    #[inline]
    #[must_use]
    pub fn status_line(&self) -> String {
        self.pool.progress().status_line()
    }

    /// Check if the capture loop has ended on its own
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the timer and wait for in-flight uploads
    ///
    /// # Errors
    /// `LabelcapError::Capture` if the capture loop panicked.
    pub async fn stop(self) -> Result<UploadProgress> {
        let _ = self.stop_tx.send(true);
        self.finish().await
    }

    /// Wait for the session to end on its own (frame limit), then for
    /// in-flight uploads
    ///
    /// Without a frame limit the loop never ends on its own and this never
    /// returns; use [`stop`](Self::stop) instead.
    ///
    /// # Errors
    /// `LabelcapError::Capture` if the capture loop panicked.
    pub async fn finish(self) -> Result<UploadProgress> {
        let Self {
            selection,
            pool,
            stop_tx,
            task,
        } = self;

        let frames = task
            .await
            .map_err(|e| LabelcapError::Capture(e.to_string()))?;
        drop(stop_tx);
        pool.drain().await?;

        let progress = pool.progress();
        tracing::info!(
            dataset = %selection.dataset,
            label = %selection.label,
            frames,
            completed = progress.completed,
            failed = progress.failed,
            "capture stopped"
        );
        Ok(progress)
    }
}

async fn run_capture(
    source: Arc<dyn FrameSource>,
    pool: UploadPool,
    selection: Selection,
    interval: Duration,
    max_frames: Option<u64>,
    mut stop_rx: watch::Receiver<bool>,
) -> u64 {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut frames = 0u64;
    loop {
        if max_frames.is_some_and(|max| frames >= max) {
            break;
        }

        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {}
        }

        let Some(payload) = source.snapshot() else {
            tracing::debug!("frame source not ready");
            continue;
        };
        frames += 1;

        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            submitted = pool.submit(payload, &selection.dataset, &selection.label) => {
                if let Err(e) = submitted {
                    tracing::warn!(error = %e, "capture loop ended");
                    break;
                }
            }
        }
    }
    frames
}
