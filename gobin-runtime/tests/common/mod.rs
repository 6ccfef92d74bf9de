#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gobin_core::{FileChange, SubscriptionId};
use gobin_sync::{ApplySummary, RemoteSync, SyncError};
use gobin_watch::WatchSession;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixListener;
use tokio::task::JoinHandle;

pub const ID: &str = "gobin:4242";
pub const ROOT: &str = "/tmp/project";

pub struct DaemonConn {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl DaemonConn {
    pub async fn send(&mut self, value: Value) {
        let mut line = value.to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await.expect("write");
        self.writer.flush().await.expect("flush");
    }

    pub async fn writer_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.expect("write");
        self.writer.flush().await.expect("flush");
    }

    /// Resolves once the client closes its end.
    pub async fn wait_for_close(&mut self) {
        while let Ok(Some(_)) = self.lines.next_line().await {}
    }

    async fn handshake(&mut self) {
        let watch = self.lines.next_line().await.expect("read").expect("watch-project");
        assert!(watch.contains("watch-project"));
        self.send(json!({ "version": "2.0", "watch": ROOT })).await;

        let subscribe = self.lines.next_line().await.expect("read").expect("subscribe");
        assert!(subscribe.contains(ID));
        self.send(json!({ "version": "2.0", "subscribe": ID })).await;
    }
}

/// Accept one client, answer the handshake, then hand over to `script`.
pub fn spawn_daemon<F, Fut>(socket: &Path, script: F) -> JoinHandle<()>
where
    F: FnOnce(DaemonConn) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    let listener = UnixListener::bind(socket).expect("bind fake daemon");
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let (reader, writer) = stream.into_split();
        let mut conn = DaemonConn {
            lines: BufReader::new(reader).lines(),
            writer,
        };
        conn.handshake().await;
        script(conn).await;
    })
}

pub async fn subscribed_session(socket: &Path) -> WatchSession {
    WatchSession::open(socket, SubscriptionId::from(ID), Path::new(ROOT))
        .await
        .expect("subscribe")
}

pub fn change(clock: &str, name: &str, exists: bool, size: u64) -> Value {
    let mut file = json!({ "name": name, "exists": exists, "type": "f", "size": size });
    if exists {
        file["mode"] = json!(33188);
    }
    json!({
        "version": "2.0",
        "clock": clock,
        "root": ROOT,
        "subscription": ID,
        "unilateral": true,
        "files": [file],
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forward {
    pub root: PathBuf,
    pub files: Vec<FileChange>,
}

#[derive(Default, Clone)]
pub struct RecordingRemote {
    pub forwards: Arc<Mutex<Vec<Forward>>>,
    pub closes: Arc<Mutex<usize>>,
}

impl RecordingRemote {
    pub fn forwards(&self) -> Vec<Forward> {
        self.forwards.lock().expect("lock").clone()
    }

    pub fn closes(&self) -> usize {
        *self.closes.lock().expect("lock")
    }
}

#[async_trait]
impl RemoteSync for RecordingRemote {
    async fn apply(&mut self, root: &Path, files: &[FileChange]) -> Result<ApplySummary, SyncError> {
        self.forwards.lock().expect("lock").push(Forward {
            root: root.to_path_buf(),
            files: files.to_vec(),
        });
        Ok(ApplySummary {
            uploaded: files.len(),
            ..ApplySummary::default()
        })
    }

    async fn close(&mut self) -> Result<(), SyncError> {
        *self.closes.lock().expect("lock") += 1;
        Ok(())
    }
}
