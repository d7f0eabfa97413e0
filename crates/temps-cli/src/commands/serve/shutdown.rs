use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Resolves on Ctrl+C (or SIGTERM on unix)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining in-flight requests...");
}

/// Wait for the job logger to drain once the queue sender is gone
pub async fn drain_job_logger(handle: JoinHandle<usize>, timeout: Duration) {
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(count)) => info!("Job logger stopped after {} jobs", count),
        Ok(Err(e)) => warn!("Job logger task failed: {}", e),
        Err(_) => warn!("Job logger did not stop within {:?}", timeout),
    }
}
