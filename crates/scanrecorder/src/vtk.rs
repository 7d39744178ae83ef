//! Legacy VTK 3.0 binary polydata writers.
//!
//! Both output formats interleave ASCII section headers with big-endian
//! binary payloads, as the legacy VTK reader expects. Input coordinate
//! buffers arrive little-endian, so every value is byte-swapped on the
//! way out. Writers encode into a memory buffer first and only then touch
//! the filesystem, so a failed encode never leaves a corrupt file behind.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};
use crate::frame::{CalibrationTransform, PointCloudFrame, PoseSample};

/// Shared file preamble for both frame and trajectory files.
const VTK_HEADER: &str = "# vtk DataFile Version 3.0\nvtk output\nBINARY\nDATASET POLYDATA\n";

fn write_f32_be<W: Write>(w: &mut W, v: f32) -> std::io::Result<()> {
    w.write_all(&v.to_be_bytes())
}

fn write_i32_be<W: Write>(w: &mut W, v: i32) -> std::io::Result<()> {
    w.write_all(&v.to_be_bytes())
}

// Legacy VTK cell payloads are i32; a count past that cannot be declared
// honestly, so it is a format error rather than a truncated write.
#[allow(clippy::cast_sign_loss)]
fn cell_index(i: usize) -> Result<i32> {
    i32::try_from(i).map_err(|_| Error::format("cell index", i32::MAX as usize, i))
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|source| Error::FileCreate {
        path: path.to_path_buf(),
        source,
    })?;
    file.write_all(contents)?;
    Ok(())
}

/// Writer for per-frame point-cloud files.
///
/// Each frame file holds the frame's points, a vertex cell referencing
/// every point, the capture timestamp as field data, and a per-point
/// ordinal scalar.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryFrameWriter;

impl BinaryFrameWriter {
    /// Create a frame writer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Serialize a frame to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn write(&self, path: &Path, frame: &PointCloudFrame) -> Result<()> {
        let mut buf = Vec::new();
        self.encode(&mut buf, frame)?;
        write_file(path, &buf)
    }

    /// Serialize a frame into an arbitrary writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn encode<W: Write>(&self, w: &mut W, frame: &PointCloudFrame) -> Result<()> {
        let points = frame.points();
        let n = points.len();

        w.write_all(VTK_HEADER.as_bytes())?;
        writeln!(w, "POINTS {n} float")?;
        for p in points {
            for v in p {
                write_f32_be(w, *v)?;
            }
        }

        // One polyvertex cell spanning all points.
        writeln!(w, "\nVERTICES 1 {}", n + 1)?;
        write_i32_be(w, cell_index(n)?)?;
        for i in 0..n {
            write_i32_be(w, cell_index(i)?)?;
        }

        writeln!(w, "\nFIELD FieldData 1\ntimestamp 1 1 float")?;
        #[allow(clippy::cast_possible_truncation)]
        write_f32_be(w, frame.timestamp() as f32)?;

        writeln!(w, "\nPOINT_DATA {n}\nSCALARS point_index int 1\nLOOKUP_TABLE default")?;
        for i in 0..n {
            write_i32_be(w, cell_index(i)?)?;
        }
        w.write_all(b"\n")?;

        Ok(())
    }
}

/// Writer for per-session pose trajectory files.
///
/// The trajectory file connects all recorded device positions as one
/// polyline, carries the camera-to-device calibration as dataset field
/// data, and attaches per-point orientation quaternions and timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseTrajectoryWriter;

impl PoseTrajectoryWriter {
    /// Create a trajectory writer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Serialize a pose trajectory to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn write(
        &self,
        path: &Path,
        samples: &[PoseSample],
        calibration: &CalibrationTransform,
    ) -> Result<()> {
        let mut buf = Vec::new();
        self.encode(&mut buf, samples, calibration)?;
        write_file(path, &buf)
    }

    /// Serialize a pose trajectory into an arbitrary writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn encode<W: Write>(
        &self,
        w: &mut W,
        samples: &[PoseSample],
        calibration: &CalibrationTransform,
    ) -> Result<()> {
        let positions: Vec<[f32; 3]> = samples.iter().map(|s| s.position).collect();
        let orientations: Vec<[f32; 4]> = samples.iter().map(|s| s.orientation).collect();
        let timestamps: Vec<f64> = samples.iter().map(|s| s.timestamp).collect();
        self.encode_arrays(w, &positions, &orientations, &timestamps, calibration)
    }

    /// Serialize a trajectory from parallel per-sample arrays.
    ///
    /// # Errors
    ///
    /// Returns a contract error before any byte is written when the arrays
    /// differ in length, or an I/O error if writing fails.
    pub(crate) fn encode_arrays<W: Write>(
        &self,
        w: &mut W,
        positions: &[[f32; 3]],
        orientations: &[[f32; 4]],
        timestamps: &[f64],
        calibration: &CalibrationTransform,
    ) -> Result<()> {
        let n = positions.len();
        if orientations.len() != n {
            return Err(Error::contract(format!(
                "orientation count {} does not match position count {n}",
                orientations.len()
            )));
        }
        if timestamps.len() != n {
            return Err(Error::contract(format!(
                "timestamp count {} does not match position count {n}",
                timestamps.len()
            )));
        }

        w.write_all(VTK_HEADER.as_bytes())?;
        writeln!(w, "POINTS {n} float")?;
        for p in positions {
            for v in p {
                write_f32_be(w, *v)?;
            }
        }

        // One polyline cell through all positions, in capture order.
        writeln!(w, "\nLINES 1 {}", n + 1)?;
        write_i32_be(w, cell_index(n)?)?;
        for i in 0..n {
            write_i32_be(w, cell_index(i)?)?;
        }

        writeln!(w, "\nFIELD FieldData 1\nCam2Dev_transform 16 1 float")?;
        for v in calibration.as_slice() {
            write_f32_be(w, *v)?;
        }

        writeln!(w, "\nPOINT_DATA {n}\nFIELD FieldData 2\norientation 4 {n} float")?;
        for q in orientations {
            for v in q {
                write_f32_be(w, *v)?;
            }
        }

        writeln!(w, "\ntimestamp 1 {n} float")?;
        for t in timestamps {
            #[allow(clippy::cast_possible_truncation)]
            write_f32_be(w, *t as f32)?;
        }
        w.write_all(b"\n")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_frame(frame: &PointCloudFrame) -> Vec<u8> {
        let mut buf = Vec::new();
        BinaryFrameWriter::new().encode(&mut buf, frame).unwrap();
        buf
    }

    fn find_section(haystack: &[u8], needle: &str) -> usize {
        haystack
            .windows(needle.len())
            .position(|w| w == needle.as_bytes())
            .unwrap_or_else(|| panic!("section {needle:?} not found"))
    }

    #[test]
    fn test_frame_header_and_sections() {
        let frame = PointCloudFrame::new(1.5, vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let buf = encode_frame(&frame);

        assert!(buf.starts_with(VTK_HEADER.as_bytes()));
        find_section(&buf, "POINTS 2 float\n");
        find_section(&buf, "\nVERTICES 1 3\n");
        find_section(&buf, "\nFIELD FieldData 1\ntimestamp 1 1 float\n");
        find_section(&buf, "\nPOINT_DATA 2\nSCALARS point_index int 1\nLOOKUP_TABLE default\n");
    }

    #[test]
    fn test_frame_point_payload_is_big_endian() {
        let frame = PointCloudFrame::new(0.0, vec![[1.0, -2.0, 0.5]]);
        let buf = encode_frame(&frame);

        let start = find_section(&buf, "POINTS 1 float\n") + "POINTS 1 float\n".len();
        let payload = &buf[start..start + 12];
        assert_eq!(&payload[0..4], &1.0f32.to_be_bytes());
        assert_eq!(&payload[4..8], &(-2.0f32).to_be_bytes());
        assert_eq!(&payload[8..12], &0.5f32.to_be_bytes());
    }

    #[test]
    fn test_frame_vertex_cell_layout() {
        let frame = PointCloudFrame::new(0.0, vec![[0.0; 3]; 3]);
        let buf = encode_frame(&frame);

        let start = find_section(&buf, "\nVERTICES 1 4\n") + "\nVERTICES 1 4\n".len();
        let cell = &buf[start..start + 16];
        assert_eq!(&cell[0..4], &3i32.to_be_bytes());
        assert_eq!(&cell[4..8], &0i32.to_be_bytes());
        assert_eq!(&cell[8..12], &1i32.to_be_bytes());
        assert_eq!(&cell[12..16], &2i32.to_be_bytes());
    }

    #[test]
    fn test_frame_timestamp_field() {
        let frame = PointCloudFrame::new(42.25, vec![[0.0; 3]]);
        let buf = encode_frame(&frame);

        let tag = "\nFIELD FieldData 1\ntimestamp 1 1 float\n";
        let start = find_section(&buf, tag) + tag.len();
        assert_eq!(&buf[start..start + 4], &42.25f32.to_be_bytes());
    }

    #[test]
    fn test_frame_empty() {
        let frame = PointCloudFrame::new(0.0, Vec::new());
        let buf = encode_frame(&frame);

        find_section(&buf, "POINTS 0 float\n");
        let start = find_section(&buf, "\nVERTICES 1 1\n") + "\nVERTICES 1 1\n".len();
        assert_eq!(&buf[start..start + 4], &0i32.to_be_bytes());
        find_section(&buf, "\nPOINT_DATA 0\n");
    }

    #[test]
    fn test_frame_write_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.vtk");
        let frame = PointCloudFrame::new(1.0, vec![[1.0, 2.0, 3.0]]);

        BinaryFrameWriter::new().write(&path, &frame).unwrap();

        let on_disk = std::fs::read(&path).unwrap();
        assert_eq!(on_disk, encode_frame(&frame));
    }

    #[test]
    fn test_cell_index_rejects_counts_past_i32() {
        let max = usize::try_from(i32::MAX).unwrap();
        assert_eq!(cell_index(max).unwrap(), i32::MAX);
        assert!(matches!(
            cell_index(max + 1).unwrap_err(),
            Error::Format { .. }
        ));
    }

    fn sample(t: f64, p: [f32; 3], q: [f32; 4]) -> PoseSample {
        PoseSample {
            timestamp: t,
            position: p,
            orientation: q,
            status_valid: true,
        }
    }

    fn encode_trajectory(samples: &[PoseSample], cal: &CalibrationTransform) -> Vec<u8> {
        let mut buf = Vec::new();
        PoseTrajectoryWriter::new()
            .encode(&mut buf, samples, cal)
            .unwrap();
        buf
    }

    #[test]
    fn test_trajectory_sections() {
        let samples = vec![
            sample(0.1, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]),
            sample(0.2, [1.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]),
        ];
        let buf = encode_trajectory(&samples, &CalibrationTransform::identity());

        assert!(buf.starts_with(VTK_HEADER.as_bytes()));
        find_section(&buf, "POINTS 2 float\n");
        find_section(&buf, "\nLINES 1 3\n");
        find_section(&buf, "\nFIELD FieldData 1\nCam2Dev_transform 16 1 float\n");
        find_section(&buf, "\nPOINT_DATA 2\nFIELD FieldData 2\norientation 4 2 float\n");
        find_section(&buf, "\ntimestamp 1 2 float\n");
    }

    #[test]
    fn test_trajectory_calibration_payload() {
        let mut m = [0.0f32; 16];
        for (i, v) in m.iter_mut().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            {
                *v = i as f32;
            }
        }
        let samples = vec![sample(0.0, [0.0; 3], [0.0, 0.0, 0.0, 1.0])];
        let buf = encode_trajectory(&samples, &CalibrationTransform::new(m));

        let tag = "\nFIELD FieldData 1\nCam2Dev_transform 16 1 float\n";
        let start = find_section(&buf, tag) + tag.len();
        for (i, v) in m.iter().enumerate() {
            assert_eq!(&buf[start + i * 4..start + i * 4 + 4], &v.to_be_bytes());
        }
    }

    #[test]
    fn test_trajectory_timestamps_payload() {
        let samples = vec![
            sample(0.5, [0.0; 3], [0.0, 0.0, 0.0, 1.0]),
            sample(1.5, [0.0; 3], [0.0, 0.0, 0.0, 1.0]),
        ];
        let buf = encode_trajectory(&samples, &CalibrationTransform::identity());

        let tag = "\ntimestamp 1 2 float\n";
        let start = find_section(&buf, tag) + tag.len();
        assert_eq!(&buf[start..start + 4], &0.5f32.to_be_bytes());
        assert_eq!(&buf[start + 4..start + 8], &1.5f32.to_be_bytes());
        // Trailing newline closes the file.
        assert_eq!(buf[start + 8], b'\n');
        assert_eq!(buf.len(), start + 9);
    }

    #[test]
    fn test_trajectory_empty() {
        let buf = encode_trajectory(&[], &CalibrationTransform::identity());
        find_section(&buf, "POINTS 0 float\n");
        find_section(&buf, "\nLINES 1 1\n");
        find_section(&buf, "\nPOINT_DATA 0\n");
    }

    #[test]
    fn test_trajectory_misaligned_arrays_rejected() {
        let positions = [[0.0f32; 3]; 2];
        let orientations = [[0.0f32, 0.0, 0.0, 1.0]];
        let timestamps = [0.1, 0.2];

        let mut buf = Vec::new();
        let err = PoseTrajectoryWriter::new()
            .encode_arrays(
                &mut buf,
                &positions,
                &orientations,
                &timestamps,
                &CalibrationTransform::identity(),
            )
            .unwrap_err();

        assert!(err.is_contract());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_trajectory_write_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poses.vtk");
        let samples = vec![sample(0.1, [1.0, 2.0, 3.0], [0.0, 0.0, 0.0, 1.0])];
        let cal = CalibrationTransform::identity();

        PoseTrajectoryWriter::new()
            .write(&path, &samples, &cal)
            .unwrap();

        let on_disk = std::fs::read(&path).unwrap();
        assert_eq!(on_disk, encode_trajectory(&samples, &cal));
    }
}
