//! Daemon locator against stand-in executables.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use gobin_watch::{DaemonLocator, WatchError};
use tempfile::TempDir;

fn fake_watchman(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("watchman");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
    path
}

#[tokio::test]
async fn locate_reads_sockname_from_stdout() {
    let dir = TempDir::new().expect("tempdir");
    let binary = fake_watchman(
        dir.path(),
        r#"[ "$1" = "get-sockname" ] || exit 2
echo '{"version":"2024.01.01.00","sockname":"/tmp/fake-watchman.sock"}'"#,
    );

    let socket = DaemonLocator::new(binary).locate().await.expect("locate");
    assert_eq!(socket, PathBuf::from("/tmp/fake-watchman.sock"));
}

#[tokio::test]
async fn missing_sockname_is_daemon_unavailable() {
    let dir = TempDir::new().expect("tempdir");
    let binary = fake_watchman(dir.path(), "echo '{}'");

    let err = DaemonLocator::new(binary).locate().await.unwrap_err();
    assert!(matches!(err, WatchError::DaemonUnavailable(_)), "got: {err}");
}

#[tokio::test]
async fn non_zero_exit_is_daemon_unavailable() {
    let dir = TempDir::new().expect("tempdir");
    let binary = fake_watchman(dir.path(), "echo 'daemon not running' >&2\nexit 1");

    let err = DaemonLocator::new(binary).locate().await.unwrap_err();
    assert!(matches!(err, WatchError::DaemonUnavailable(_)), "got: {err}");
    assert!(err.to_string().contains("daemon not running"));
}
