//! Turn the first termination signal into the one-shot terminate broadcast.

use std::fmt;
use std::future::Future;

use gobin_core::{ShutdownListener, ShutdownSignal};
use nix::sys::signal::{SigHandler, Signal as NixSignal};
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Signals that request an orderly shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationKind {
    Hangup,
    Interrupt,
    Terminate,
    Quit,
}

impl fmt::Display for TerminationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationKind::Hangup => write!(f, "SIGHUP"),
            TerminationKind::Interrupt => write!(f, "SIGINT"),
            TerminationKind::Terminate => write!(f, "SIGTERM"),
            TerminationKind::Quit => write!(f, "SIGQUIT"),
        }
    }
}

/// Process signal streams for SIGHUP, SIGINT, SIGTERM and SIGQUIT.
pub struct SignalSet {
    hangup: Signal,
    interrupt: Signal,
    terminate: Signal,
    quit: Signal,
}

impl SignalSet {
    /// Must be called from inside a tokio runtime.
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            hangup: signal(SignalKind::hangup())?,
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    pub async fn recv(&mut self) -> TerminationKind {
        tokio::select! {
            _ = self.hangup.recv() => TerminationKind::Hangup,
            _ = self.interrupt.recv() => TerminationKind::Interrupt,
            _ = self.terminate.recv() => TerminationKind::Terminate,
            _ = self.quit.recv() => TerminationKind::Quit,
        }
    }

    /// Resolve on the first signal, then hand every signal of the set back
    /// to its default action so a repeat kills a stalled shutdown.
    pub fn first(mut self) -> impl Future<Output = TerminationKind> + Send {
        async move {
            let kind = self.recv().await;
            drop(self);
            restore_default_actions();
            kind
        }
    }
}

const HANDLED: [NixSignal; 4] = [
    NixSignal::SIGHUP,
    NixSignal::SIGINT,
    NixSignal::SIGTERM,
    NixSignal::SIGQUIT,
];

/// Reset SIGHUP, SIGINT, SIGTERM and SIGQUIT to `SIG_DFL`.
pub fn restore_default_actions() {
    for sig in HANDLED {
        // SAFETY: SIG_DFL installs no handler code in this process.
        if let Err(err) = unsafe { nix::sys::signal::signal(sig, SigHandler::SigDfl) } {
            tracing::warn!(signal = %sig, error = %err, "failed to restore default signal action");
        }
    }
}

/// Owns the terminate broadcast for one run.
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    signal: ShutdownSignal,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener(&self) -> ShutdownListener {
        self.signal.listener()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.signal.is_triggered()
    }

    /// Fire the broadcast without a signal, e.g. once the pipeline ended on
    /// its own or a task failed. Returns `false` if it had already fired.
    pub fn shutdown(&self) -> bool {
        self.signal.trigger()
    }

    /// Wait for the first termination request and broadcast it. Returns
    /// `None` when the broadcast fired some other way first.
    pub async fn listen<F>(&self, termination: F) -> Option<TerminationKind>
    where
        F: Future<Output = TerminationKind>,
    {
        let mut fired = self.listener();
        tokio::select! {
            biased;
            _ = fired.wait() => None,
            kind = termination => {
                if self.signal.trigger() {
                    tracing::info!(signal = %kind, "closing...");
                }
                Some(kind)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;

    #[tokio::test]
    async fn first_signal_fires_the_broadcast_once() {
        let coordinator = ShutdownCoordinator::new();
        let mut listener = coordinator.listener();

        let kind = coordinator
            .listen(std::future::ready(TerminationKind::Interrupt))
            .await;
        assert_eq!(kind, Some(TerminationKind::Interrupt));
        assert!(coordinator.is_shutting_down());
        tokio::time::timeout(Duration::from_secs(1), listener.wait())
            .await
            .expect("listener observes terminate");

        assert!(!coordinator.shutdown(), "second trigger is a no-op");
        assert_eq!(
            coordinator
                .listen(std::future::ready(TerminationKind::Terminate))
                .await,
            None,
            "no second broadcast once shutdown began"
        );
    }

    #[tokio::test]
    async fn listen_returns_when_shutdown_happens_elsewhere() {
        let coordinator = ShutdownCoordinator::new();
        let (_keep, never) = oneshot::channel::<()>();
        let termination = async move {
            let _ = never.await;
            std::future::pending::<TerminationKind>().await
        };

        let listening = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.listen(termination).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(coordinator.shutdown());

        let kind = tokio::time::timeout(Duration::from_secs(1), listening)
            .await
            .expect("listener released")
            .expect("join");
        assert_eq!(kind, None);
    }

    #[test]
    fn termination_kind_display() {
        assert_eq!(TerminationKind::Hangup.to_string(), "SIGHUP");
        assert_eq!(TerminationKind::Quit.to_string(), "SIGQUIT");
    }
}
