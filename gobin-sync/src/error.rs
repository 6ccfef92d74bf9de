//! Error types for gobin-sync.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while talking to the remote host.
///
/// [`SyncError::Connect`] is fatal for the run; everything else fails a
/// single change event.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote session could not be established.
    #[error("can't connect {destination}: {reason}")]
    Connect { destination: String, reason: String },

    /// A remote command exited unsuccessfully.
    #[error("`{command}` failed ({status}): {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    /// The transport executable could not be started.
    #[error("can't run {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A local file could not be read for upload.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("remote session is closed")]
    Closed,
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
