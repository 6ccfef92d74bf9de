//! Find the control socket of the running watch daemon.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;

use crate::error::WatchError;

/// Environment override honoured by Watchman's own clients.
pub const SOCKET_ENV: &str = "WATCHMAN_SOCK";

const INSTALL_HINT: &str = "have you installed Watchman? (https://facebook.github.io/watchman/)";

#[derive(Debug, Deserialize)]
struct SocknameResponse {
    #[serde(default)]
    version: Option<String>,
    sockname: String,
}

#[derive(Debug, Clone)]
pub struct DaemonLocator {
    binary: PathBuf,
    socket_override: Option<PathBuf>,
}

impl DaemonLocator {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            socket_override: None,
        }
    }

    /// Like [`DaemonLocator::new`], but a non-empty `WATCHMAN_SOCK` short-circuits
    /// the subprocess.
    pub fn from_env(binary: impl Into<PathBuf>) -> Self {
        let socket_override = std::env::var_os(SOCKET_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        Self {
            binary: binary.into(),
            socket_override,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Resolve the socket path. No retry: a missing or broken daemon is a
    /// configuration error.
    pub async fn locate(&self) -> Result<PathBuf, WatchError> {
        if let Some(socket) = &self.socket_override {
            tracing::debug!(socket = %socket.display(), "using {SOCKET_ENV}");
            return Ok(socket.clone());
        }

        let output = Command::new(&self.binary)
            .arg("get-sockname")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| {
                WatchError::DaemonUnavailable(format!(
                    "can't run `{} get-sockname`: {err}; {INSTALL_HINT}",
                    self.binary.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(WatchError::DaemonUnavailable(format!(
                "`{} get-sockname` failed ({}): {stderr}",
                self.binary.display(),
                output.status
            )));
        }

        let socket = parse_sockname(&output.stdout)?;
        tracing::debug!(socket = %socket.display(), "located watch daemon socket");
        Ok(socket)
    }
}

/// Decode the one-line JSON answer of `get-sockname`.
pub fn parse_sockname(stdout: &[u8]) -> Result<PathBuf, WatchError> {
    let response: SocknameResponse = serde_json::from_slice(stdout).map_err(|err| {
        WatchError::DaemonUnavailable(format!(
            "can't parse get-sockname response {:?}: {err}",
            String::from_utf8_lossy(stdout).trim()
        ))
    })?;

    if response.sockname.is_empty() {
        return Err(WatchError::DaemonUnavailable(
            "get-sockname returned an empty sockname".to_string(),
        ));
    }
    if let Some(version) = &response.version {
        tracing::debug!(%version, "watch daemon version");
    }
    Ok(PathBuf::from(response.sockname))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn parses_sockname() {
        let socket = parse_sockname(br#"{"version":"2024.01.01.00","sockname":"/tmp/wm.sock"}"#)
            .expect("parse");
        assert_eq!(socket, PathBuf::from("/tmp/wm.sock"));
    }

    #[rstest]
    #[case::no_field(b"{}".as_slice())]
    #[case::empty_field(br#"{"sockname":""}"#.as_slice())]
    #[case::wrong_type(br#"{"sockname":42}"#.as_slice())]
    #[case::empty_output(b"".as_slice())]
    fn unusable_response_is_daemon_unavailable(#[case] stdout: &[u8]) {
        let err = parse_sockname(stdout).unwrap_err();
        assert!(matches!(err, WatchError::DaemonUnavailable(_)), "got: {err}");
    }

    #[test]
    fn garbage_is_reported_verbatim() {
        let err = parse_sockname(b"not json at all").unwrap_err();
        assert!(matches!(err, WatchError::DaemonUnavailable(_)), "got: {err}");
        assert!(err.to_string().contains("not json at all"));
    }

    #[tokio::test]
    async fn missing_binary_is_daemon_unavailable() {
        let locator = DaemonLocator::new("/definitely/not/here/watchman");
        let err = locator.locate().await.unwrap_err();
        assert!(matches!(err, WatchError::DaemonUnavailable(_)), "got: {err}");
        assert!(err.to_string().contains("installed Watchman"));
    }
}
