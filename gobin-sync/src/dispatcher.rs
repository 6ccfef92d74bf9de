//! Drain the change channel into the remote session.

use gobin_core::{ChangeEvent, ChangeReceiver, ShutdownListener};

use crate::remote::RemoteSync;

/// Why the dispatcher returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStop {
    /// The terminate broadcast fired.
    Terminated,
    /// The watch session closed the channel and every queued event was handled.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub forwarded: usize,
    pub failed: usize,
    /// Events still queued when terminate was observed.
    pub dropped: usize,
    pub stop: DispatchStop,
}

/// Owns the remote session for the run.
pub struct SyncDispatcher<R> {
    remote: R,
}

impl<R: RemoteSync> SyncDispatcher<R> {
    pub fn new(remote: R) -> Self {
        Self { remote }
    }

    /// Forward events until terminate or channel exhaustion, then close the
    /// remote session. A forward already in progress when terminate fires is
    /// allowed to finish; nothing queued behind it is forwarded.
    pub async fn run(
        mut self,
        mut changes: ChangeReceiver,
        mut shutdown: ShutdownListener,
    ) -> DispatchReport {
        let mut forwarded = 0usize;
        let mut failed = 0usize;

        let stop = loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.wait() => break DispatchStop::Terminated,
                event = changes.recv() => event,
            };
            let Some(event) = event else {
                break DispatchStop::Exhausted;
            };

            if self.forward(&event).await {
                forwarded += 1;
            } else {
                failed += 1;
            }
        };

        let dropped = changes.len();
        drop(changes);

        tracing::info!("sync: closing...");
        if let Err(err) = self.remote.close().await {
            tracing::warn!(error = %err, "error while closing remote session");
        }

        let report = DispatchReport {
            forwarded,
            failed,
            dropped,
            stop,
        };
        tracing::info!(
            forwarded = report.forwarded,
            failed = report.failed,
            dropped = report.dropped,
            stop = ?report.stop,
            "sync dispatcher finished",
        );
        report
    }

    async fn forward(&mut self, event: &ChangeEvent) -> bool {
        for file in &event.files {
            tracing::debug!(file = %file.name, kind = %file.file_type, exists = file.exists, "change");
        }

        match self.remote.apply(&event.root_path(), &event.files).await {
            Ok(summary) => {
                tracing::info!(
                    clock = %event.clock,
                    files = event.files.len(),
                    uploaded = summary.uploaded,
                    removed = summary.removed,
                    directories = summary.directories,
                    skipped = summary.skipped,
                    "change applied",
                );
                true
            }
            Err(err) => {
                tracing::error!(
                    clock = %event.clock,
                    files = event.files.len(),
                    error = %err,
                    "change failed to apply",
                );
                false
            }
        }
    }
}
