//! Seam between the dispatcher and whatever applies changes remotely.

use std::path::Path;

use async_trait::async_trait;

use gobin_core::FileChange;

use crate::SyncError;

/// Counts for one applied change event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub uploaded: usize,
    pub removed: usize,
    pub directories: usize,
    pub skipped: usize,
}

/// A remote session owned by the sync dispatcher for the whole run.
#[async_trait]
pub trait RemoteSync: Send {
    /// Apply `files`, named relative to the local `root`, on the remote side.
    async fn apply(&mut self, root: &Path, files: &[FileChange]) -> Result<ApplySummary, SyncError>;

    /// Orderly teardown. Called exactly once, after the last `apply`.
    async fn close(&mut self) -> Result<(), SyncError>;
}
