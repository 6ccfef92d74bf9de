use std::path::PathBuf;

use thiserror::Error;

/// Error surface for locating, talking to and draining the watch daemon.
///
/// Every variant is fatal for the run; a clean end of stream is not an error.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watch daemon unavailable: {0}")]
    DaemonUnavailable(String),

    #[error("can't open watch daemon socket {socket}: {source}")]
    Connection {
        socket: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on {socket}: {source}")]
    Io {
        socket: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("watch protocol error: {0}")]
    Protocol(String),

    #[error("can't parse watch daemon message {line:?}: {source}")]
    Decode {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("watch session is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: crate::session::SessionState,
        actual: crate::session::SessionState,
    },
}

pub(crate) fn io_err(socket: impl Into<PathBuf>, source: std::io::Error) -> WatchError {
    WatchError::Io {
        socket: socket.into(),
        source,
    }
}
