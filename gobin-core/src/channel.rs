//! Ordered single-producer/single-consumer conduit from the watch session to
//! the sync dispatcher.
//!
//! Dropping the [`ChangeSender`] closes the channel: the receiver still gets
//! every event already queued and then observes `None`.

use tokio::sync::mpsc;

use crate::types::ChangeEvent;

/// Default queue depth between detection and transmission.
pub const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Producer half, owned by the watch session.
#[derive(Debug)]
pub struct ChangeSender {
    inner: mpsc::Sender<ChangeEvent>,
}

/// Consumer half, owned by the sync dispatcher.
#[derive(Debug)]
pub struct ChangeReceiver {
    inner: mpsc::Receiver<ChangeEvent>,
}

/// Returned by [`ChangeSender::send`] once the receiver is gone. Carries the
/// event back to the caller.
#[derive(Debug)]
pub struct ReceiverClosed(pub ChangeEvent);

pub fn change_channel(capacity: usize) -> (ChangeSender, ChangeReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChangeSender { inner: tx }, ChangeReceiver { inner: rx })
}

impl ChangeSender {
    /// Enqueue an event, waiting for room when the queue is full.
    pub async fn send(&self, event: ChangeEvent) -> Result<(), ReceiverClosed> {
        self.inner
            .send(event)
            .await
            .map_err(|mpsc::error::SendError(event)| ReceiverClosed(event))
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl ChangeReceiver {
    /// Next event in enqueue order, or `None` once the sender is dropped and
    /// the queue is empty.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.inner.recv().await
    }

    /// Number of events queued but not yet received.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
