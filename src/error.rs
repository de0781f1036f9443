//! Error types for rotated logging and stream redirection

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for rotalog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while creating writers, rotating files or
/// redirecting the standard streams.
#[derive(Error, Debug)]
pub enum Error {
    /// The writer was given an empty path
    #[error("log file path is empty")]
    EmptyPath,

    /// Failed to create the directory holding the log file
    #[error("failed to create log directory at {path}: {source}")]
    CreateDirectory {
        /// The directory that could not be created
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// Failed to open the active log file at construction time
    #[error("failed to open log file {path}: {source}")]
    Open {
        /// The file that could not be opened
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// A step of the close-archive-reopen sequence failed
    #[error("failed to {step} {path} during rotation: {source}")]
    Rotation {
        /// Which step failed ("lock", "stat", "close", "archive", "reopen")
        step: &'static str,
        /// The file involved
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// Another process holds the advisory rotation lock
    #[error("log file {0} is locked by another process")]
    Busy(PathBuf),

    /// The writer has no active handle, typically after a failed rotation
    #[error("no active log file for {0}")]
    NoActiveFile(PathBuf),

    /// I/O error on the active handle
    #[error("failed to write log file: {0}")]
    Write(#[from] io::Error),

    /// Standard stream redirection failed for one descriptor or file
    #[error("failed to {action}: {source}")]
    Redirect {
        /// What the redirector was doing
        action: String,
        /// The underlying error
        source: io::Error,
    },
}

impl Error {
    /// Whether this error belongs to writer construction
    pub fn is_init(&self) -> bool {
        matches!(
            self,
            Error::EmptyPath | Error::CreateDirectory { .. } | Error::Open { .. }
        )
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Write(e) => e,
            Error::Busy(_) => io::Error::new(io::ErrorKind::WouldBlock, err),
            Error::NoActiveFile(_) => io::Error::new(io::ErrorKind::NotFound, err),
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}
