//! Shutdown signal handling
//!
//! Resolves on the first SIGINT or SIGTERM. If neither handler can be
//! installed (restricted environments), or on non-unix targets, falls back
//! to Ctrl-C.

use tracing::{info, warn};

/// Wait for a termination signal
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let sigint = signal(SignalKind::interrupt())
        .inspect_err(|e| warn!("Failed to register SIGINT handler: {}", e))
        .ok();
    let sigterm = signal(SignalKind::terminate())
        .inspect_err(|e| warn!("Failed to register SIGTERM handler: {}", e))
        .ok();

    match (sigint, sigterm) {
        (Some(mut int), Some(mut term)) => {
            tokio::select! {
                _ = int.recv() => info!("Received SIGINT"),
                _ = term.recv() => info!("Received SIGTERM"),
            }
        }
        (Some(mut int), None) => {
            int.recv().await;
            info!("Received SIGINT");
        }
        (None, Some(mut term)) => {
            term.recv().await;
            info!("Received SIGTERM");
        }
        (None, None) => {
            warn!("No signal handlers registered, falling back to Ctrl-C");
            ctrl_c().await;
        }
    }
}

/// Wait for a termination signal
#[cfg(not(unix))]
pub async fn shutdown_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C"),
        Err(e) => {
            // Nothing left to wait on; stay up until killed
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
