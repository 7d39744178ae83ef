//! Recording storage layout.
//!
//! All session output lands flat in one recordings directory: frame files
//! and the trajectory file while a session runs, archives once it closes.
//! Naming is fixed so a session's files sort together and the archive name
//! alone says how many files it holds.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::archive::{SessionArchiver, ARCHIVE_EXTENSION};
use crate::config::Config;
use crate::error::{Error, Result};

/// Paths and naming for everything the recorder writes to disk.
#[derive(Debug, Clone)]
pub struct RecordingStore {
    base_dir: PathBuf,
    file_prefix: String,
    archive_prefix: String,
}

/// Metadata about one session archive on disk.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveInfo {
    /// Archive file name.
    pub filename: String,
    /// Full path to the archive.
    pub path: PathBuf,
    /// Archive size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: Option<DateTime<Utc>>,
}

impl RecordingStore {
    /// Build a store from the application configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_dir: config.recordings_dir(),
            file_prefix: config.storage.file_prefix.clone(),
            archive_prefix: config.storage.archive_prefix.clone(),
        }
    }

    /// Build a store over an explicit directory with default prefixes.
    #[must_use]
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            file_prefix: "pc".to_string(),
            archive_prefix: "scan".to_string(),
        }
    }

    /// Create the recordings directory if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir).map_err(|source| Error::DirectoryCreate {
            path: self.base_dir.clone(),
            source,
        })
    }

    /// The recordings directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The archive filename prefix.
    #[must_use]
    pub fn archive_prefix(&self) -> &str {
        &self.archive_prefix
    }

    /// Path for a frame file within a session.
    ///
    /// Sequence numbers are zero-padded to three digits so directory
    /// listings sort in capture order.
    #[must_use]
    pub fn frame_path(&self, session_id: &str, sequence: u32) -> PathBuf {
        self.base_dir
            .join(format!("{}_{session_id}_{sequence:03}.vtk", self.file_prefix))
    }

    /// Path for a session's pose trajectory file.
    #[must_use]
    pub fn trajectory_path(&self, session_id: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}_{session_id}_poses.vtk", self.file_prefix))
    }

    /// Path for a session archive holding `file_count` entries.
    #[must_use]
    pub fn archive_path(&self, session_id: &str, file_count: usize) -> PathBuf {
        let name = SessionArchiver::new(self.archive_prefix.clone())
            .archive_name(session_id, file_count);
        self.base_dir.join(name)
    }

    /// List session archives in the recordings directory, newest first.
    ///
    /// A missing directory yields an empty list. Unreadable entries are
    /// skipped with a warning.
    #[must_use]
    pub fn list_archives(&self) -> Vec<ArchiveInfo> {
        let entries = match std::fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(dir = %self.base_dir.display(), error = %err, "cannot read recordings directory");
                }
                return Vec::new();
            }
        };

        let suffix = format!(".{ARCHIVE_EXTENSION}");
        let mut archives = Vec::new();
        for entry in entries {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(&suffix) {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    warn!(file = name, error = %err, "cannot stat archive");
                    continue;
                }
            };
            archives.push(ArchiveInfo {
                filename: name.to_string(),
                path: path.clone(),
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::from),
            });
        }

        archives.sort_by(|a, b| b.modified.cmp(&a.modified));
        archives
    }
}
