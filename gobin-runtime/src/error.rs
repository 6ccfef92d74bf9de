use thiserror::Error;

use gobin_sync::SyncError;
use gobin_watch::WatchError;

/// Fatal outcomes of a run. Each variant names the stage that failed.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("watch daemon: {0}")]
    Watch(#[from] WatchError),

    #[error("remote session: {0}")]
    Sync(#[from] SyncError),

    #[error("signal handler: {0}")]
    Signal(#[source] std::io::Error),

    #[error("tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("{task} task join failure: {reason}")]
    Join { task: &'static str, reason: String },
}
