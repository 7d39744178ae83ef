//! Frame ingest pipeline.
//!
//! The pipeline is the single entry point the sensor loop talks to. Depth
//! frames and pose updates come in, capture decisions and disk work go
//! out to the worker pool. Nothing in the ingest path waits on disk; a
//! full queue costs a frame, never latency.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{error, warn};

use crate::config::Config;
use crate::controller::RecordingController;
use crate::error::Result;
use crate::frame::{CalibrationTransform, PointCloudEvent, PointCloudFrame, PoseEvent};
use crate::storage::RecordingStore;
use crate::worker::{Job, WorkerPool};

/// Observer for every decoded frame, captured or not.
///
/// Rendering and live statistics hang off this seam; the pipeline itself
/// only persists.
pub trait FrameSink: Send + Sync {
    /// Called with each successfully decoded frame.
    fn on_frame(&self, frame: &PointCloudFrame);
}

/// Handle for one session close in progress.
///
/// Returned when recording is disabled; the archive is produced in the
/// background, behind any frame writes still in flight.
#[derive(Debug)]
pub struct SessionClosing {
    session_id: String,
    rx: oneshot::Receiver<PathBuf>,
}

impl SessionClosing {
    /// The identifier of the session being closed.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Wait for the session archive.
    ///
    /// Returns the archive path, or `None` if archiving failed (the
    /// failure itself is logged by the worker).
    pub async fn wait(self) -> Option<PathBuf> {
        self.rx.await.ok()
    }
}

/// Accepts sensor events and drives capture, persistence and archiving.
pub struct FrameIngestPipeline {
    controller: Arc<RecordingController>,
    store: RecordingStore,
    pool: WorkerPool,
    sink: Option<Arc<dyn FrameSink>>,
}

impl fmt::Debug for FrameIngestPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameIngestPipeline")
            .field("store", &self.store)
            .field("has_sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

impl FrameIngestPipeline {
    /// Build a pipeline from the application configuration.
    ///
    /// Creates the recordings directory and starts the worker pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the recordings directory cannot be created.
    pub fn new(config: &Config, calibration: CalibrationTransform) -> Result<Self> {
        let store = RecordingStore::from_config(config);
        store.ensure()?;

        let pool = WorkerPool::spawn(
            config.workers.count,
            config.workers.queue_depth,
            store.clone(),
            calibration,
        );

        Ok(Self {
            controller: Arc::new(RecordingController::new(config.capture.auto_mode)),
            store,
            pool,
            sink: None,
        })
    }

    /// Attach a frame observer.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn FrameSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The recording controller, for control surfaces that only need
    /// state changes.
    #[must_use]
    pub fn controller(&self) -> &Arc<RecordingController> {
        &self.controller
    }

    /// Accept one depth frame from the sensor.
    ///
    /// Decodes the raw buffer, feeds the observer, and when the capture
    /// policy says so hands the frame to the worker pool. Malformed
    /// buffers and a full queue both cost this one frame and are logged;
    /// neither stops the stream.
    pub fn ingest_frame(&self, event: &PointCloudEvent) {
        let frame = match PointCloudFrame::from_event(event) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "malformed depth frame dropped");
                return;
            }
        };

        if let Some(sink) = &self.sink {
            sink.on_frame(&frame);
        }

        let Some(ticket) = self.controller.begin_frame(&self.store) else {
            return;
        };

        let accepted = self.pool.try_submit(Job::WriteFrame {
            path: ticket.path,
            frame,
        });
        if !accepted {
            warn!(
                sequence = ticket.sequence,
                "write queue full, captured frame dropped"
            );
        }
    }

    /// Accept one pose update from the sensor.
    pub fn ingest_pose(&self, event: &PoseEvent) {
        self.controller.record_pose(event);
    }

    /// Enable or disable recording.
    ///
    /// Disabling an active session schedules its close behind all
    /// accepted frame writes and returns a handle to await the archive.
    pub async fn set_recording(&self, enable: bool) -> Option<SessionClosing> {
        let handle = self.controller.set_recording(enable)?;
        let session_id = handle.session_id().to_string();

        let (notify, rx) = oneshot::channel();
        let submitted = self.pool.submit(Job::CloseSession { handle, notify }).await;
        if !submitted {
            error!(session_id, "worker pool gone, session not archived");
        }
        Some(SessionClosing { session_id, rx })
    }

    /// Request that the next frame be captured regardless of mode.
    pub fn request_snapshot(&self) {
        self.controller.request_snapshot();
    }

    /// Enable or disable auto mode.
    pub fn set_auto_mode(&self, enabled: bool) {
        self.controller.set_auto_mode(enabled);
    }

    /// Whether a session is currently recording.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.controller.is_recording()
    }

    /// Stop accepting work and wait for the queue to drain.
    pub async fn shutdown(self) {
        self.pool.shutdown().await;
    }
}
