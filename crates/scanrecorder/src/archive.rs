//! Session archiving.
//!
//! When a session closes, every file it produced is bundled into a single
//! gzip-compressed tar archive and the loose originals are removed. The
//! archive name records the session id and the number of entries, so the
//! directory listing alone shows what each archive holds.

use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// File extension for session archives.
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// Bundles a closed session's files into one compressed archive.
#[derive(Debug, Clone)]
pub struct SessionArchiver {
    prefix: String,
}

impl SessionArchiver {
    /// Create an archiver using `prefix` for archive file names.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The archive file name for a session with `file_count` entries.
    #[must_use]
    pub fn archive_name(&self, session_id: &str, file_count: usize) -> String {
        format!(
            "{}_{session_id}_{file_count}files.{ARCHIVE_EXTENSION}",
            self.prefix
        )
    }

    /// Bundle `files` into an archive under `dest_dir` and delete the
    /// originals.
    ///
    /// Files that have vanished since the session produced them are
    /// skipped with a warning. An empty file list still produces a valid
    /// empty archive. Failures to delete an original after archiving are
    /// logged, never propagated.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive itself cannot be created or
    /// written.
    pub fn archive(&self, session_id: &str, files: &[PathBuf], dest_dir: &Path) -> Result<PathBuf> {
        let archive_path = dest_dir.join(self.archive_name(session_id, files.len()));

        let out = File::create(&archive_path).map_err(|source| Error::FileCreate {
            path: archive_path.clone(),
            source,
        })?;
        let encoder = GzEncoder::new(out, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let mut archived = 0usize;
        for file in files {
            let Some(name) = file.file_name() else {
                warn!(file = %file.display(), "skipping file with no name");
                continue;
            };
            match builder.append_path_with_name(file, name) {
                Ok(()) => archived += 1,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    warn!(file = %file.display(), "session file missing, skipping");
                }
                Err(err) => return Err(err.into()),
            }
        }

        let encoder = builder.into_inner()?;
        let out = encoder.finish()?;
        out.sync_all()?;

        for file in files {
            if let Err(err) = std::fs::remove_file(file) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(file = %file.display(), error = %err, "cannot remove archived file");
                }
            }
        }

        info!(
            session_id,
            archive = %archive_path.display(),
            files = archived,
            "session archived"
        );
        Ok(archive_path)
    }
}
