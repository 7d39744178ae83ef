//! Recording session control.
//!
//! One controller owns all mutable recording state behind a single lock:
//! the active flag, the session identity, the frame and file counters, the
//! capture flags and the pose buffer. Sensor callbacks for poses and depth
//! frames may arrive on different threads; every decision that spans more
//! than one field happens under the one lock, so a frame can never observe
//! a half-updated session.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info};

use crate::frame::{PoseEvent, PoseSample, PoseStatus};
use crate::storage::RecordingStore;

/// In auto mode, one frame in this many is captured.
pub const AUTO_CAPTURE_INTERVAL: u64 = 3;

/// Buffered pose samples for the current session.
#[derive(Debug, Clone, Default)]
pub struct PoseBuffer {
    samples: Vec<PoseSample>,
}

impl PoseBuffer {
    /// Append a sample.
    pub fn push(&mut self, sample: PoseSample) {
        self.samples.push(sample);
    }

    /// Number of buffered samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the buffer holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Consume the buffer, yielding the samples in capture order.
    #[must_use]
    pub fn into_samples(self) -> Vec<PoseSample> {
        self.samples
    }
}

/// Everything a closed session hands to the archiving stage.
///
/// Created exactly once per session, at the moment recording is disabled.
/// The file list and pose buffer are moved out of the controller, so
/// captures belonging to a later session can never leak in.
#[derive(Debug)]
pub struct SessionCloseHandle {
    session_id: String,
    poses: PoseBuffer,
    files: Vec<PathBuf>,
}

impl SessionCloseHandle {
    /// The closed session's identifier.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Files the session produced, in creation order.
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Poses the session buffered.
    #[must_use]
    pub fn poses(&self) -> &PoseBuffer {
        &self.poses
    }

    /// Decompose into session id, pose buffer and file list.
    #[must_use]
    pub fn into_parts(self) -> (String, PoseBuffer, Vec<PathBuf>) {
        (self.session_id, self.poses, self.files)
    }
}

/// Permission to persist one frame, reserved atomically with its
/// sequence number and output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureTicket {
    /// Where the frame file goes.
    pub path: PathBuf,
    /// The frame's gapless per-session sequence number.
    pub sequence: u32,
    /// Whether this capture consumed a snapshot request.
    pub snapshot: bool,
}

#[derive(Debug)]
struct SessionState {
    active: bool,
    session_id: String,
    file_sequence: u32,
    produced_files: Vec<PathBuf>,
    pending_snapshot: bool,
    auto_mode: bool,
    frame_counter: u64,
}

impl SessionState {
    fn should_capture(&self, frame_index: u64) -> bool {
        self.pending_snapshot
            || (self.active && self.auto_mode && frame_index % AUTO_CAPTURE_INTERVAL == 0)
    }
}

#[derive(Debug)]
struct Inner {
    session: SessionState,
    poses: PoseBuffer,
    // Session id collision handling for restarts within one millisecond.
    last_raw: String,
    collision_counter: u32,
}

impl Inner {
    fn next_session_id(&mut self) -> String {
        let raw = Utc::now().format("%Y%m%d_%H%M%S%3f").to_string();
        if raw == self.last_raw {
            self.collision_counter += 1;
            format!("{raw}_{}", self.collision_counter)
        } else {
            self.last_raw.clone_from(&raw);
            self.collision_counter = 0;
            raw
        }
    }
}

/// The recording state machine.
///
/// Shared between the sensor-facing ingest path and the control surface;
/// all methods take `&self`.
#[derive(Debug)]
pub struct RecordingController {
    inner: Mutex<Inner>,
}

impl RecordingController {
    /// Create an idle controller.
    ///
    /// The controller starts with a session identity so that snapshots
    /// requested outside any session still have somewhere to go.
    #[must_use]
    pub fn new(auto_mode: bool) -> Self {
        let mut inner = Inner {
            session: SessionState {
                active: false,
                session_id: String::new(),
                file_sequence: 0,
                produced_files: Vec::new(),
                pending_snapshot: false,
                auto_mode,
                frame_counter: 0,
            },
            poses: PoseBuffer::default(),
            last_raw: String::new(),
            collision_counter: 0,
        };
        inner.session.session_id = inner.next_session_id();
        Self {
            inner: Mutex::new(inner),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enable or disable recording.
    ///
    /// Enabling while idle starts a fresh session: new identity, counters
    /// reset, pose buffer and file list cleared. Disabling while recording
    /// closes the session and returns its close handle. Setting the state
    /// it already has does nothing.
    pub fn set_recording(&self, enable: bool) -> Option<SessionCloseHandle> {
        let mut inner = self.lock();
        if inner.session.active == enable {
            return None;
        }

        if enable {
            let session_id = inner.next_session_id();
            info!(session_id, "recording session started");
            inner.session.active = true;
            inner.session.session_id = session_id;
            inner.session.file_sequence = 0;
            inner.session.frame_counter = 0;
            inner.session.produced_files.clear();
            inner.poses = PoseBuffer::default();
            None
        } else {
            inner.session.active = false;
            inner.session.pending_snapshot = false;
            let session_id = inner.session.session_id.clone();
            let poses = std::mem::take(&mut inner.poses);
            let files = std::mem::take(&mut inner.session.produced_files);
            info!(
                session_id,
                files = files.len(),
                poses = poses.len(),
                "recording session closed"
            );
            Some(SessionCloseHandle {
                session_id,
                poses,
                files,
            })
        }
    }

    /// Request that the next frame be captured regardless of mode.
    pub fn request_snapshot(&self) {
        let mut inner = self.lock();
        inner.session.pending_snapshot = true;
        debug!("snapshot requested");
    }

    /// Enable or disable auto mode.
    pub fn set_auto_mode(&self, enabled: bool) {
        self.lock().session.auto_mode = enabled;
    }

    /// Whether auto mode is enabled.
    #[must_use]
    pub fn auto_mode(&self) -> bool {
        self.lock().session.auto_mode
    }

    /// Whether a session is currently recording.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.lock().session.active
    }

    /// The current session identifier.
    #[must_use]
    pub fn session_id(&self) -> String {
        self.lock().session.session_id.clone()
    }

    /// Number of poses buffered for the current session.
    #[must_use]
    pub fn pose_count(&self) -> usize {
        self.lock().poses.len()
    }

    /// Whether a frame with the given index would be captured right now.
    ///
    /// Read-only: reserves nothing and leaves any pending snapshot
    /// request in place. `begin_frame` is the reserving form.
    #[must_use]
    pub fn should_capture_this_frame(&self, frame_index: u64) -> bool {
        self.lock().session.should_capture(frame_index)
    }

    /// Clear a pending snapshot request without capturing.
    pub fn consume_snapshot_flag(&self) {
        self.lock().session.pending_snapshot = false;
    }

    /// Buffer a pose event.
    ///
    /// Only valid poses arriving while a session is active are kept;
    /// everything else is discarded.
    pub fn record_pose(&self, event: &PoseEvent) {
        let mut inner = self.lock();
        if inner.session.active && event.status == PoseStatus::Valid {
            inner.poses.push(PoseSample::from_event(event));
        }
    }

    /// Account for one arriving frame and decide whether to capture it.
    ///
    /// Advances the frame counter, applies the capture policy, and on a
    /// positive decision reserves the next sequence number, registers the
    /// output path as produced, and consumes any pending snapshot request.
    /// All of it happens under one lock acquisition.
    pub fn begin_frame(&self, store: &RecordingStore) -> Option<CaptureTicket> {
        let mut inner = self.lock();
        inner.session.frame_counter += 1;
        let frame_index = inner.session.frame_counter;

        if !inner.session.should_capture(frame_index) {
            return None;
        }

        let snapshot = inner.session.pending_snapshot;
        inner.session.pending_snapshot = false;

        let sequence = inner.session.file_sequence;
        inner.session.file_sequence += 1;

        let path = store.frame_path(&inner.session.session_id, sequence);
        inner.session.produced_files.push(path.clone());

        debug!(
            session_id = inner.session.session_id,
            sequence, snapshot, "frame capture reserved"
        );
        Some(CaptureTicket {
            path,
            sequence,
            snapshot,
        })
    }
}
