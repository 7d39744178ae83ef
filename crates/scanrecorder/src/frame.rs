//! Core data types for the recording pipeline.
//!
//! This module defines the sensor-facing event types (poses and raw depth
//! frames), the decoded forms the pipeline works with, and the fixed
//! calibration transform embedded in trajectory files.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Bytes per point in a raw depth buffer (three little-endian f32).
pub const POINT_STRIDE: usize = 12;

/// Tracking status attached to a pose event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseStatus {
    /// The pose is tracked and usable.
    Valid,
    /// Tracking is lost.
    Invalid,
    /// Tracking is still converging.
    Initializing,
    /// The sensor reported an unrecognized status.
    Unknown,
}

impl std::fmt::Display for PoseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::Invalid => write!(f, "invalid"),
            Self::Initializing => write!(f, "initializing"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A pose update delivered by the sensor collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseEvent {
    /// Capture time in seconds on the sensor clock.
    pub timestamp: f64,
    /// Tracking status for this sample.
    pub status: PoseStatus,
    /// Device translation, meters.
    pub translation: [f32; 3],
    /// Device orientation quaternion (x, y, z, w).
    pub rotation: [f32; 4],
}

/// A raw depth frame delivered by the sensor collaborator.
///
/// `raw` holds `point_count * 3` little-endian f32 values starting at
/// `raw_byte_offset`.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloudEvent {
    /// Capture time in seconds on the sensor clock.
    pub timestamp: f64,
    /// Number of (x, y, z) triples in the buffer.
    pub point_count: u32,
    /// The raw coordinate buffer.
    pub raw: Vec<u8>,
    /// Offset of the first coordinate byte within `raw`.
    pub raw_byte_offset: u32,
}

/// One buffered pose sample.
///
/// Appended to the session's pose buffer on each valid pose event while
/// recording is active; immutable once appended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    /// Capture time in seconds on the sensor clock.
    pub timestamp: f64,
    /// Device position, meters.
    pub position: [f32; 3],
    /// Device orientation quaternion (x, y, z, w).
    pub orientation: [f32; 4],
    /// Whether the source event reported a valid tracking status.
    pub status_valid: bool,
}

impl PoseSample {
    /// Build a sample from a pose event.
    #[must_use]
    pub fn from_event(event: &PoseEvent) -> Self {
        Self {
            timestamp: event.timestamp,
            position: event.translation,
            orientation: event.rotation,
            status_valid: event.status == PoseStatus::Valid,
        }
    }
}

/// A decoded point-cloud frame.
///
/// Transient: exists only for the duration of one ingest call, then is
/// either serialized or discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloudFrame {
    timestamp: f64,
    points: Vec<[f32; 3]>,
}

impl PointCloudFrame {
    /// Create a frame from already-decoded coordinates.
    #[must_use]
    pub fn new(timestamp: f64, points: Vec<[f32; 3]>) -> Self {
        Self { timestamp, points }
    }

    /// Decode a frame from a raw depth event.
    ///
    /// # Errors
    ///
    /// Returns a format error when the raw buffer does not hold
    /// `point_count * 3` f32 values past the declared offset.
    pub fn from_event(event: &PointCloudEvent) -> Result<Self> {
        let offset = event.raw_byte_offset as usize;
        let needed = event.point_count as usize * POINT_STRIDE;
        let payload = event
            .raw
            .get(offset..offset + needed)
            .ok_or_else(|| {
                Error::format(
                    "point cloud buffer",
                    needed,
                    event.raw.len().saturating_sub(offset),
                )
            })?;

        let points = payload
            .chunks_exact(POINT_STRIDE)
            .map(|chunk| {
                [
                    f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
                    f32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]),
                    f32::from_le_bytes([chunk[8], chunk[9], chunk[10], chunk[11]]),
                ]
            })
            .collect();

        Ok(Self {
            timestamp: event.timestamp,
            points,
        })
    }

    /// Capture time in seconds on the sensor clock.
    #[must_use]
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Number of points in the frame.
    #[must_use]
    pub fn point_count(&self) -> u32 {
        u32::try_from(self.points.len()).unwrap_or(u32::MAX)
    }

    /// The decoded (x, y, z) coordinates.
    #[must_use]
    pub fn points(&self) -> &[[f32; 3]] {
        &self.points
    }

    /// Check if the frame holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// The camera-to-device calibration transform.
///
/// A row-major 4x4 matrix computed once by the calibration collaborator
/// and treated as read-only for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTransform([f32; 16]);

impl CalibrationTransform {
    /// Wrap a row-major 16-float matrix.
    #[must_use]
    pub fn new(matrix: [f32; 16]) -> Self {
        Self(matrix)
    }

    /// The identity transform.
    #[must_use]
    pub fn identity() -> Self {
        let mut m = [0.0; 16];
        m[0] = 1.0;
        m[5] = 1.0;
        m[10] = 1.0;
        m[15] = 1.0;
        Self(m)
    }

    /// The 16 matrix entries in row-major order.
    #[must_use]
    pub fn as_slice(&self) -> &[f32; 16] {
        &self.0
    }
}

impl Default for CalibrationTransform {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_from_points(points: &[[f32; 3]], lead: usize) -> Vec<u8> {
        let mut raw = vec![0u8; lead];
        for p in points {
            for v in p {
                raw.extend_from_slice(&v.to_le_bytes());
            }
        }
        raw
    }

    #[test]
    fn test_pose_status_display() {
        assert_eq!(PoseStatus::Valid.to_string(), "valid");
        assert_eq!(PoseStatus::Invalid.to_string(), "invalid");
        assert_eq!(PoseStatus::Initializing.to_string(), "initializing");
        assert_eq!(PoseStatus::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_pose_sample_from_event() {
        let event = PoseEvent {
            timestamp: 1.25,
            status: PoseStatus::Valid,
            translation: [0.1, 0.2, 0.3],
            rotation: [0.0, 0.0, 0.0, 1.0],
        };
        let sample = PoseSample::from_event(&event);
        assert_eq!(sample.timestamp, 1.25);
        assert_eq!(sample.position, [0.1, 0.2, 0.3]);
        assert_eq!(sample.orientation, [0.0, 0.0, 0.0, 1.0]);
        assert!(sample.status_valid);
    }

    #[test]
    fn test_pose_sample_from_invalid_event() {
        let event = PoseEvent {
            timestamp: 2.0,
            status: PoseStatus::Initializing,
            translation: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
        };
        assert!(!PoseSample::from_event(&event).status_valid);
    }

    #[test]
    fn test_frame_decode() {
        let points = vec![[1.0, 2.0, 3.0], [-4.0, 5.5, 0.25]];
        let event = PointCloudEvent {
            timestamp: 3.5,
            point_count: 2,
            raw: raw_from_points(&points, 0),
            raw_byte_offset: 0,
        };

        let frame = PointCloudFrame::from_event(&event).unwrap();
        assert_eq!(frame.timestamp(), 3.5);
        assert_eq!(frame.point_count(), 2);
        assert_eq!(frame.points(), points.as_slice());
    }

    #[test]
    fn test_frame_decode_with_offset() {
        let points = vec![[7.0, 8.0, 9.0]];
        let event = PointCloudEvent {
            timestamp: 0.5,
            point_count: 1,
            raw: raw_from_points(&points, 8),
            raw_byte_offset: 8,
        };

        let frame = PointCloudFrame::from_event(&event).unwrap();
        assert_eq!(frame.points(), points.as_slice());
    }

    #[test]
    fn test_frame_decode_empty() {
        let event = PointCloudEvent {
            timestamp: 0.0,
            point_count: 0,
            raw: Vec::new(),
            raw_byte_offset: 0,
        };

        let frame = PointCloudFrame::from_event(&event).unwrap();
        assert!(frame.is_empty());
        assert_eq!(frame.point_count(), 0);
    }

    #[test]
    fn test_frame_decode_truncated_buffer() {
        let event = PointCloudEvent {
            timestamp: 0.0,
            point_count: 2,
            raw: vec![0u8; 20], // needs 24
            raw_byte_offset: 0,
        };

        let err = PointCloudFrame::from_event(&event).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Format {
                expected: 24,
                actual: 20,
                ..
            }
        ));
    }

    #[test]
    fn test_frame_decode_offset_past_end() {
        let event = PointCloudEvent {
            timestamp: 0.0,
            point_count: 1,
            raw: vec![0u8; 12],
            raw_byte_offset: 16,
        };

        assert!(PointCloudFrame::from_event(&event).is_err());
    }

    #[test]
    fn test_calibration_identity() {
        let t = CalibrationTransform::identity();
        let m = t.as_slice();
        assert_eq!(m[0], 1.0);
        assert_eq!(m[5], 1.0);
        assert_eq!(m[10], 1.0);
        assert_eq!(m[15], 1.0);
        assert_eq!(m.iter().copied().sum::<f32>(), 4.0);
        assert_eq!(CalibrationTransform::default(), t);
    }
}
