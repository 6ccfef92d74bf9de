//! Real process signals. Kept in its own test binary so no other test shares
//! the process-wide signal dispositions.

#![cfg(unix)]

mod common;

use std::time::Duration;

use common::*;
use gobin_runtime::{run_pipeline, SignalSet, TerminationKind};
use gobin_sync::DispatchStop;
use gobin_watch::StopReason;
use nix::sys::signal::{raise, Signal};
use tempfile::TempDir;

#[tokio::test]
async fn sigint_during_decode_wait_closes_the_session() {
    let dir = TempDir::new().expect("tempdir");
    let socket = dir.path().join("watchman.sock");
    let daemon = spawn_daemon(&socket, |mut conn| async move {
        conn.wait_for_close().await;
    });

    let session = subscribed_session(&socket).await;
    let remote = RecordingRemote::default();
    let signals = SignalSet::install().expect("install handlers");

    let run = tokio::spawn(run_pipeline(session, remote.clone(), signals.first()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    raise(Signal::SIGINT).expect("raise SIGINT");

    let report = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("pipeline stops after SIGINT")
        .expect("join")
        .expect("clean run");
    tokio::time::timeout(Duration::from_secs(2), daemon)
        .await
        .expect("socket closed")
        .expect("daemon");

    assert_eq!(report.signal, Some(TerminationKind::Interrupt));
    assert_eq!(report.watch.reason, StopReason::Terminated);
    assert_eq!(report.dispatch.stop, DispatchStop::Terminated);
    assert_eq!(remote.closes(), 1);
}

const CHILD_ENV: &str = "GOBIN_SIGNAL_CHILD";

/// Runs in a child process: the first SIGINT is handled, the following
/// SIGTERM must take its default action and kill the process.
#[tokio::test]
#[ignore = "spawned by repeated_signal_kills_the_process"]
async fn repeated_signal_child() {
    if std::env::var_os(CHILD_ENV).is_none() {
        return;
    }
    let signals = SignalSet::install().expect("install handlers");
    let first = tokio::spawn(signals.first());
    tokio::time::sleep(Duration::from_millis(50)).await;
    raise(Signal::SIGINT).expect("raise SIGINT");
    let kind = tokio::time::timeout(Duration::from_secs(2), first)
        .await
        .expect("first signal observed")
        .expect("join");
    assert_eq!(kind, TerminationKind::Interrupt);

    raise(Signal::SIGTERM).expect("raise SIGTERM");
    tokio::time::sleep(Duration::from_millis(500)).await;
    std::process::exit(0);
}

#[test]
fn repeated_signal_kills_the_process() {
    use std::os::unix::process::ExitStatusExt;

    let exe = std::env::current_exe().expect("test binary");
    let status = std::process::Command::new(exe)
        .args(["repeated_signal_child", "--exact", "--ignored", "--nocapture"])
        .env(CHILD_ENV, "1")
        .status()
        .expect("spawn child");

    assert_eq!(status.signal(), Some(Signal::SIGTERM as i32), "status: {status}");
}
