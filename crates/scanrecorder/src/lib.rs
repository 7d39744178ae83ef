//! Point-cloud frame recording pipeline with session archiving.
//!
//! scanrecorder turns a stream of depth frames and device poses into
//! recorded sessions on disk: individually serialized point-cloud frames
//! in the legacy VTK 3.0 binary format, one pose trajectory file per
//! session, and a single compressed archive per closed session.
//!
//! The [`FrameIngestPipeline`] is the main entry point. It owns the
//! [`RecordingController`] state machine that decides which frames to
//! capture (explicit snapshots, or one-in-three subsampling in auto
//! mode), and a bounded worker pool that keeps all disk I/O off the
//! sensor path.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod archive;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod frame;
pub mod logging;
pub mod pipeline;
pub mod storage;
pub mod vtk;

mod worker;

pub use archive::{SessionArchiver, ARCHIVE_EXTENSION};
pub use cli::{Cli, Command, ConfigCommand};
pub use config::{CaptureConfig, Config, StorageConfig, WorkerConfig};
pub use controller::{
    CaptureTicket, PoseBuffer, RecordingController, SessionCloseHandle, AUTO_CAPTURE_INTERVAL,
};
pub use error::{Error, Result};
pub use frame::{
    CalibrationTransform, PointCloudEvent, PointCloudFrame, PoseEvent, PoseSample, PoseStatus,
};
pub use logging::{init_logging, Verbosity};
pub use pipeline::{FrameIngestPipeline, FrameSink, SessionClosing};
pub use storage::{ArchiveInfo, RecordingStore};
pub use vtk::{BinaryFrameWriter, PoseTrajectoryWriter};
