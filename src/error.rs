//! Error types for the tailing reader.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Why the change notifier could not be set up.
#[derive(Error, Debug)]
pub enum SetupSource {
    /// The notify backend refused to create a watcher or add the watch.
    #[error(transparent)]
    Notify(#[from] notify::Error),

    /// The watched directory could not be resolved.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The main error type for tailing operations.
///
/// End-of-stream is not an error: `read` reports it as `Ok(0)`.
#[derive(Error, Debug)]
pub enum Error {
    /// The watch on the parent directory could not be established.
    #[error("Failed to watch {}: {source}", .path.display())]
    Setup {
        path: PathBuf,
        #[source]
        source: SetupSource,
    },

    /// The file did not appear within the configured wait-for-file timeout.
    #[error("Timed out after {timeout:?} waiting for {} to exist", .path.display())]
    WaitTimeout { path: PathBuf, timeout: Duration },

    /// No new data arrived within the configured idle timeout.
    #[error("No new data in {} for {timeout:?}", .path.display())]
    IdleTimeout { path: PathBuf, timeout: Duration },

    /// Stat, open or read of the tailed file failed.
    #[error("Cannot access {}: {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The change notifier reported a transport error.
    #[error("File watcher error: {0}")]
    Notification(#[from] notify::Error),

    /// The change notifier stopped delivering events.
    #[error("File watcher closed")]
    NotifierClosed,

    /// A cancellation signal fired while waiting.
    #[error("Wait cancelled")]
    Cancelled,

    /// The target path has no file name component.
    #[error("Invalid file path: {message}")]
    InvalidPath { message: String },
}

impl Error {
    pub(crate) fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::FileAccess {
            path: path.into(),
            source,
        }
    }

    /// Whether this is one of the two timeout conditions.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::WaitTimeout { .. } | Error::IdleTimeout { .. })
    }
}

/// A convenient Result type for tailing operations.
pub type Result<T> = std::result::Result<T, Error>;
