//! Owned connection to the watch daemon.
//!
//! ```text
//! Unconnected --connect--> Connected --subscribe--> Subscribed --drain--> Draining --> Closed
//! ```
//!
//! [`WatchSession::drain`] races every socket read and every channel push
//! against the terminate broadcast, so a silent daemon or a full channel can
//! never hold the session past shutdown.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

use gobin_core::{ChangeSender, ShutdownListener, SubscriptionId, WatchHandshake};

use crate::error::{io_err, WatchError};
use crate::protocol::{self, DaemonMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    Connected,
    Subscribed,
    Draining,
    Closed,
}

/// Why the decode loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The daemon closed the socket.
    EndOfStream,
    /// The terminate broadcast fired.
    Terminated,
    /// The change channel's receiver was dropped.
    ConsumerGone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub reason: StopReason,
    pub events: usize,
}

struct Connection {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

pub struct WatchSession {
    socket: PathBuf,
    subscription_id: SubscriptionId,
    state: SessionState,
    conn: Option<Connection>,
    handshake: Option<WatchHandshake>,
}

impl WatchSession {
    pub fn new(socket: impl Into<PathBuf>, subscription_id: SubscriptionId) -> Self {
        Self {
            socket: socket.into(),
            subscription_id,
            state: SessionState::Unconnected,
            conn: None,
            handshake: None,
        }
    }

    /// Connect and subscribe in one step.
    pub async fn open(
        socket: impl Into<PathBuf>,
        subscription_id: SubscriptionId,
        dir: &Path,
    ) -> Result<Self, WatchError> {
        let mut session = Self::new(socket, subscription_id);
        session.connect().await?;
        session.subscribe(dir).await?;
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    pub fn subscription_id(&self) -> &SubscriptionId {
        &self.subscription_id
    }

    pub fn handshake(&self) -> Option<&WatchHandshake> {
        self.handshake.as_ref()
    }

    pub async fn connect(&mut self) -> Result<(), WatchError> {
        self.expect_state(SessionState::Unconnected)?;

        let stream = UnixStream::connect(&self.socket)
            .await
            .map_err(|source| WatchError::Connection {
                socket: self.socket.clone(),
                source,
            })?;
        let (reader, writer) = stream.into_split();
        self.conn = Some(Connection {
            lines: BufReader::new(reader).lines(),
            writer,
        });
        self.state = SessionState::Connected;
        tracing::debug!(socket = %self.socket.display(), "connected to watch daemon");
        Ok(())
    }

    /// Resolve the watch root for `dir` and register the filtered
    /// subscription on it.
    pub async fn subscribe(&mut self, dir: &Path) -> Result<WatchHandshake, WatchError> {
        self.expect_state(SessionState::Connected)?;
        let dir = dir.display().to_string();

        let line = self
            .command(&protocol::watch_project_request(&dir), "watch-project")
            .await?;
        let project = protocol::decode_watch_project(&line)?;
        if let Some(warning) = &project.warning {
            tracing::warn!(%warning, "watch daemon warning");
        }

        let request = protocol::subscribe_request(
            &project.watch,
            &self.subscription_id,
            project.relative_path.as_deref(),
        );
        let line = self.command(&request, "subscribe").await?;
        let ack = protocol::decode_subscribe(&line, &self.subscription_id)?;

        let handshake = WatchHandshake {
            watch_root: project.watch,
            relative_path: project.relative_path.filter(|r| !r.is_empty()),
            subscription_id: SubscriptionId::from(ack.subscribe),
        };
        tracing::info!(
            watch = %handshake.watch_root,
            relative_path = handshake.relative_path.as_deref().unwrap_or(""),
            subscription = %handshake.subscription_id,
            "watching successfully",
        );

        self.handshake = Some(handshake.clone());
        self.state = SessionState::Subscribed;
        Ok(handshake)
    }

    /// Decode pushed messages into `changes` until end of stream or
    /// terminate, then close the socket. `changes` is dropped on return,
    /// which closes the channel behind the last queued event.
    pub async fn drain(
        &mut self,
        changes: ChangeSender,
        mut shutdown: ShutdownListener,
    ) -> Result<DrainReport, WatchError> {
        self.expect_state(SessionState::Subscribed)?;
        let Some(mut conn) = self.conn.take() else {
            return Err(WatchError::Protocol("subscribed session has no connection".to_string()));
        };
        let root = self
            .handshake
            .as_ref()
            .filter(|h| h.relative_path.is_some())
            .map(WatchHandshake::effective_root);

        let mut events = 0usize;
        let outcome = loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.wait() => break Ok(StopReason::Terminated),
                line = conn.lines.next_line() => line,
            };
            let line = match next {
                Ok(Some(line)) => line,
                Ok(None) => break Ok(StopReason::EndOfStream),
                Err(err) => break Err(io_err(&self.socket, err)),
            };
            if line.trim().is_empty() {
                continue;
            }

            let mut event = match protocol::decode_message(&line) {
                Ok(DaemonMessage::Change(event)) => event,
                Ok(DaemonMessage::State { name, entering }) => {
                    tracing::debug!(state = %name, entering, "daemon state notification");
                    continue;
                }
                Ok(DaemonMessage::Log(message)) => {
                    tracing::debug!(%message, "daemon log");
                    continue;
                }
                Err(err) => break Err(err),
            };

            if event.subscription_id != self.subscription_id {
                tracing::warn!(
                    subscription = %event.subscription_id,
                    "ignoring change for foreign subscription",
                );
                continue;
            }
            if let Some(root) = &root {
                event.root = root.clone();
            }
            if event.is_fresh_instance {
                tracing::info!(files = event.files.len(), "initial file listing received");
            }

            tokio::select! {
                biased;
                _ = shutdown.wait() => break Ok(StopReason::Terminated),
                sent = changes.send(event) => {
                    if sent.is_err() {
                        break Ok(StopReason::ConsumerGone);
                    }
                    events += 1;
                }
            }
        };

        self.state = SessionState::Draining;
        drop(changes);
        if let Err(err) = conn.writer.shutdown().await {
            tracing::debug!(error = %err, "watch socket shutdown");
        }
        drop(conn);
        self.state = SessionState::Closed;

        let reason = outcome?;
        tracing::info!(reason = ?reason, events, "watch session closed");
        Ok(DrainReport { reason, events })
    }

    async fn command(&mut self, request: &Value, name: &str) -> Result<String, WatchError> {
        let socket = self.socket.clone();
        let Some(conn) = self.conn.as_mut() else {
            return Err(WatchError::Protocol(format!("{name}: no connection")));
        };

        let payload = protocol::encode_line(request)?;
        conn.writer
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| io_err(&socket, e))?;
        conn.writer.flush().await.map_err(|e| io_err(&socket, e))?;

        loop {
            match conn.lines.next_line().await.map_err(|e| io_err(&socket, e))? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return Ok(line),
                None => {
                    return Err(WatchError::Protocol(format!(
                        "socket closed at {name}"
                    )))
                }
            }
        }
    }

    fn expect_state(&self, expected: SessionState) -> Result<(), WatchError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(WatchError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }
}

impl std::fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("socket", &self.socket)
            .field("subscription_id", &self.subscription_id)
            .field("state", &self.state)
            .field("handshake", &self.handshake)
            .finish()
    }
}
