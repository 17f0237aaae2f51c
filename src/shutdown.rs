use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// How a worker reacts to SIGINT/SIGTERM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Exit immediately with status 1. No cleanup runs, so the pid file and
    /// processing directory stay behind for `status` to report.
    Forced,
    /// Cancel the worker loop and let it finish its current cycle, then
    /// exit with status 0.
    Graceful,
}

/// Install a shutdown handler that listens for SIGTERM and SIGINT.
///
/// Returns a `CancellationToken` the worker loop monitors. In
/// [`ShutdownMode::Forced`] the token never fires; the process exits on the
/// spot instead.
pub fn install_shutdown_handler(mode: ShutdownMode) -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT");
            }
        }

        match mode {
            ShutdownMode::Graceful => {
                tracing::info!("finishing current cycle before exit");
                token_clone.cancel();
            }
            ShutdownMode::Forced => std::process::exit(1),
        }
    });

    token
}
