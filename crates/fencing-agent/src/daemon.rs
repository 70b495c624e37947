//! Process signal handling.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancel `cancel` on the first termination signal.
///
/// Handlers are registered before this returns, so a signal that arrives
/// right after startup is not lost.
///
/// # Errors
///
/// Returns an error if a signal handler cannot be registered.
#[cfg(unix)]
pub fn spawn_signal_handler(cancel: CancellationToken) -> Result<()> {
    use anyhow::Context;
    use tokio::signal::unix::{SignalKind, signal};

    let mut sighup = signal(SignalKind::hangup()).context("Failed to register SIGHUP handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;
    let mut sigquit = signal(SignalKind::quit()).context("Failed to register SIGQUIT handler")?;

    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sighup.recv() => "SIGHUP",
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
            _ = sigquit.recv() => "SIGQUIT",
            () = cancel.cancelled() => return,
        };
        info!(signal = name, "Received termination signal");
        cancel.cancel();
    });
    Ok(())
}

/// Cancel `cancel` on Ctrl+C.
///
/// # Errors
///
/// Never fails on this platform.
#[cfg(not(unix))]
pub fn spawn_signal_handler(cancel: CancellationToken) -> Result<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Error waiting for Ctrl+C");
                }
                info!("Received Ctrl+C");
                cancel.cancel();
            }
            () = cancel.cancelled() => {}
        }
    });
    Ok(())
}
