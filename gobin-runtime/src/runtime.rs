use std::future::Future;

use gobin_core::{change_channel, Config, SubscriptionId, CHANGE_CHANNEL_CAPACITY};
use gobin_sync::{DispatchReport, RemoteSync, SshRemote, SshTarget, SyncDispatcher};
use gobin_watch::{DaemonLocator, DrainReport, WatchSession};

use crate::error::RuntimeError;
use crate::shutdown::{ShutdownCoordinator, SignalSet, TerminationKind};

/// Outcome of a run that shut down cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub watch: DrainReport,
    pub dispatch: DispatchReport,
    /// The signal that ended the run, if one did.
    pub signal: Option<TerminationKind>,
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Build a runtime, run the pipeline and block the current thread until it exits.
pub fn start_blocking(config: Config, log_format: LogFormat) -> Result<RunReport, RuntimeError> {
    init_tracing(log_format);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(RuntimeError::Runtime)?;
    runtime.block_on(run(config))
}

/// Locate the watch daemon, subscribe to `config.source`, open the remote
/// session and forward changes until a signal or end of stream.
pub async fn run(config: Config) -> Result<RunReport, RuntimeError> {
    let target = SshTarget::from(&config);
    tracing::info!(
        source = %config.source.display(),
        destination = %target.destination(),
        directory = %target.directory,
        "starting",
    );

    // Before anything that needs teardown.
    let signals = SignalSet::install().map_err(RuntimeError::Signal)?;

    let socket = DaemonLocator::from_env(&config.watchman).locate().await?;
    tracing::debug!(socket = %socket.display(), "watch daemon located");

    let session = WatchSession::open(&socket, SubscriptionId::for_process(), &config.source).await?;
    if let Some(handshake) = session.handshake() {
        tracing::info!(
            root = %handshake.watch_root,
            subscription = %handshake.subscription_id,
            "watching",
        );
    }

    let remote = SshRemote::connect(target).await?;

    run_pipeline(session, remote, signals.first()).await
}

/// Wire a subscribed session to a remote through the change channel and run
/// both until the pipeline stops. `termination` resolves on the first
/// shutdown request.
pub async fn run_pipeline<R, F>(
    session: WatchSession,
    remote: R,
    termination: F,
) -> Result<RunReport, RuntimeError>
where
    R: RemoteSync + 'static,
    F: Future<Output = TerminationKind> + Send + 'static,
{
    let coordinator = ShutdownCoordinator::new();
    let (changes_tx, changes_rx) = change_channel(CHANGE_CHANNEL_CAPACITY);

    let signal_handle = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.listen(termination).await })
    };

    let watch_handle = {
        let coordinator = coordinator.clone();
        let mut session = session;
        tokio::spawn(async move {
            let result = session.drain(changes_tx, coordinator.listener()).await;
            if result.is_err() {
                coordinator.shutdown();
            }
            result
        })
    };

    let dispatch_handle = {
        let dispatcher = SyncDispatcher::new(remote);
        tokio::spawn(dispatcher.run(changes_rx, coordinator.listener()))
    };

    tracing::info!("ready");

    let (watch_result, dispatch_result) = tokio::join!(watch_handle, dispatch_handle);
    // Releases the signal listener when the pipeline ended without one.
    coordinator.shutdown();
    let signal_result = signal_handle.await;

    tracing::info!("terminating");

    let watch = handle_join("watch", watch_result)??;
    let dispatch = handle_join("dispatch", dispatch_result)?;
    let signal = handle_join("signal", signal_result)?;
    Ok(RunReport {
        watch,
        dispatch,
        signal,
    })
}

fn handle_join<T>(
    task: &'static str,
    result: Result<T, tokio::task::JoinError>,
) -> Result<T, RuntimeError> {
    result.map_err(|err| RuntimeError::Join {
        task,
        reason: err.to_string(),
    })
}

/// Install the fmt subscriber; `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
