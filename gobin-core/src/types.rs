//! Domain types for the change-notification pipeline.
//!
//! Field names follow the watch daemon's wire format so that a change push
//! decodes straight into a [`ChangeEvent`].

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Name of the subscription registered with the watch daemon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub String);

impl SubscriptionId {
    /// `gobin:<pid>`, unique per process.
    pub fn for_process() -> Self {
        Self::for_pid(std::process::id())
    }

    pub fn for_pid(pid: u32) -> Self {
        Self(format!("gobin:{pid}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SubscriptionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SubscriptionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Kind of filesystem entry, as reported in the daemon's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FileType {
    #[serde(rename = "f")]
    File,
    #[serde(rename = "d")]
    Directory,
    #[serde(rename = "l")]
    Symlink,
    /// Block/char devices, fifos, sockets, Solaris doors, and anything the
    /// daemon did not report a type for.
    #[default]
    #[serde(rename = "?", other)]
    Other,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::File => write!(f, "file"),
            FileType::Directory => write!(f, "directory"),
            FileType::Symlink => write!(f, "symlink"),
            FileType::Other => write!(f, "other"),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One file observed created, changed or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Path relative to the event's `root`.
    pub name: String,
    /// `false` signals deletion.
    pub exists: bool,
    #[serde(rename = "type", default)]
    pub file_type: FileType,
    /// Byte count; meaningless when `exists` is false.
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
}

/// One notification batch pushed by the watch daemon for a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub clock: String,
    pub root: String,
    #[serde(rename = "subscription")]
    pub subscription_id: SubscriptionId,
    pub files: Vec<FileChange>,
    #[serde(default)]
    pub is_fresh_instance: bool,
}

impl ChangeEvent {
    pub fn root_path(&self) -> PathBuf {
        PathBuf::from(&self.root)
    }
}

/// Outcome of the watch-project/subscribe exchange. Created once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchHandshake {
    /// Daemon-canonicalized root of the watch.
    pub watch_root: String,
    /// Offset from `watch_root` to the requested directory, when they differ.
    pub relative_path: Option<String>,
    pub subscription_id: SubscriptionId,
}

impl WatchHandshake {
    /// Directory that change names are relative to.
    pub fn effective_root(&self) -> String {
        match &self.relative_path {
            Some(relative) if !relative.is_empty() => {
                PathBuf::from(&self.watch_root)
                    .join(relative)
                    .display()
                    .to_string()
            }
            _ => self.watch_root.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_id_embeds_pid() {
        assert_eq!(SubscriptionId::for_pid(1234).to_string(), "gobin:1234");
        assert!(SubscriptionId::for_process()
            .as_str()
            .ends_with(&std::process::id().to_string()));
    }

    #[test]
    fn change_event_decodes_wire_message() {
        let line = r#"{"version":"2.0","clock":"c:1:2","root":"/tmp/project","subscription":"gobin:1","unilateral":true,"files":[{"name":"a.txt","exists":true,"size":12,"type":"f","mode":33188},{"name":"b.txt","exists":false}]}"#;
        let event: ChangeEvent = serde_json::from_str(line).expect("decode");

        assert_eq!(event.clock, "c:1:2");
        assert_eq!(event.subscription_id, SubscriptionId::from("gobin:1"));
        assert!(!event.is_fresh_instance);
        assert_eq!(event.files.len(), 2);
        assert_eq!(event.files[0].file_type, FileType::File);
        assert_eq!(event.files[0].size, 12);
        assert_eq!(event.files[0].mode, Some(33188));
        assert!(!event.files[1].exists);
        assert_eq!(event.files[1].file_type, FileType::Other);
    }

    #[test]
    fn unknown_type_codes_map_to_other() {
        for code in ["b", "c", "p", "s", "D"] {
            let json = format!(r#"{{"name":"x","exists":true,"type":"{code}"}}"#);
            let file: FileChange = serde_json::from_str(&json).expect("decode");
            assert_eq!(file.file_type, FileType::Other, "code {code}");
        }
    }

    #[test]
    fn effective_root_joins_relative_path() {
        let mut handshake = WatchHandshake {
            watch_root: "/home/me/repo".to_string(),
            relative_path: Some("web".to_string()),
            subscription_id: SubscriptionId::from("gobin:1"),
        };
        assert_eq!(handshake.effective_root(), "/home/me/repo/web");

        handshake.relative_path = None;
        assert_eq!(handshake.effective_root(), "/home/me/repo");
    }

    #[test]
    fn file_type_display() {
        assert_eq!(FileType::Directory.to_string(), "directory");
        assert_eq!(FileType::Symlink.to_string(), "symlink");
    }
}
