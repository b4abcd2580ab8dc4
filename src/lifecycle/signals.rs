//! OS signal handling.
//!
//! [`wait_for_shutdown_signal`] completes when the process receives SIGINT,
//! SIGTERM or SIGQUIT. Shutdown is the only cancellation unit: there is no
//! per-subsystem stop.

use tokio::signal::unix::{signal, SignalKind};

use crate::lifecycle::shutdown::Shutdown;

/// Wait for a termination signal.
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => tracing::info!("Received SIGINT, initiating shutdown"),
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating shutdown"),
        _ = sigquit.recv() => tracing::info!("Received SIGQUIT, initiating shutdown"),
    }
    Ok(())
}

/// Trigger `shutdown` on the first termination signal.
///
/// If the handlers cannot be installed the daemon keeps running and can only
/// be stopped by SIGKILL.
pub async fn forward_to(shutdown: Shutdown) {
    match wait_for_shutdown_signal().await {
        Ok(()) => shutdown.trigger(),
        Err(e) => tracing::error!(error = %e, "Failed to install signal handlers"),
    }
}
