//! One-shot terminate broadcast.
//!
//! A [`ShutdownSignal`] fires at most once. Any number of
//! [`ShutdownListener`]s, including ones created after it fired, observe the
//! same event.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the broadcast. Returns `true` only for the call that actually
    /// fired it; every later call is a no-op returning `false`.
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }
}

impl ShutdownListener {
    /// Resolve once the broadcast has fired. Also resolves if every
    /// [`ShutdownSignal`] handle is dropped, since nothing can fire it then.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|fired| *fired).await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn only_first_trigger_fires() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());
        assert!(signal.trigger());
        assert!(!signal.trigger());
        assert!(!signal.clone().trigger());
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn every_listener_observes_the_broadcast() {
        let signal = ShutdownSignal::new();
        let mut early_a = signal.listener();
        let mut early_b = signal.listener();

        let waiters = tokio::spawn(async move {
            early_a.wait().await;
            early_b.wait().await;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiters)
            .await
            .expect("listeners released")
            .expect("join");

        let mut late = signal.listener();
        assert!(late.is_triggered());
        tokio::time::timeout(Duration::from_secs(1), late.wait())
            .await
            .expect("late listener sees fired state");
    }

    #[tokio::test]
    async fn dropping_all_signals_releases_listeners() {
        let signal = ShutdownSignal::new();
        let mut listener = signal.listener();
        drop(signal);
        tokio::time::timeout(Duration::from_secs(1), listener.wait())
            .await
            .expect("listener released");
        assert!(!listener.is_triggered());
    }
}
