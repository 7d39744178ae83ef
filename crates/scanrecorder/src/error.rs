//! Error types for scanrecorder.
//!
//! Three classes of failure matter to the recording pipeline: I/O errors
//! (recovered locally by logging and skipping the affected save), format
//! errors (a binary payload would not match its declared header counts;
//! fatal to that one write, never emitted as a corrupt file), and contract
//! errors (misaligned buffer lengths; rejected before any byte is written).
//! None of them may escape into the frame-delivery loop.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for scanrecorder operations.
#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create an output file.
    #[error("failed to create file {path}: {source}")]
    FileCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Format Errors ===
    /// A binary payload does not match its declared count.
    #[error("format error in {context}: expected {expected}, got {actual}")]
    Format {
        /// What was being encoded or decoded.
        context: &'static str,
        /// Count the declaration requires.
        expected: usize,
        /// Count actually seen.
        actual: usize,
    },

    // === Contract Errors ===
    /// A caller supplied structurally inconsistent input.
    #[error("contract violation: {message}")]
    Contract {
        /// Description of the violated precondition.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },
}

/// A specialized Result type for scanrecorder operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a format error for a payload/declaration mismatch.
    #[must_use]
    pub fn format(context: &'static str, expected: usize, actual: usize) -> Self {
        Self::Format {
            context,
            expected,
            actual,
        }
    }

    /// Create a contract violation error.
    #[must_use]
    pub fn contract(message: impl Into<String>) -> Self {
        Self::Contract {
            message: message.into(),
        }
    }

    /// Check if this error is in the locally recoverable I/O class.
    ///
    /// Recoverable errors are logged and the affected save is skipped;
    /// the frame stream continues.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::FileCreate { .. } | Self::DirectoryCreate { .. }
        )
    }

    /// Check if this error is a contract violation.
    #[must_use]
    pub fn is_contract(&self) -> bool {
        matches!(self, Self::Contract { .. })
    }
}
