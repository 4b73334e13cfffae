use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Cancels `shutdown` on Ctrl+C or SIGTERM.
///
/// Returns early without cancelling if the token is cancelled by something
/// else first (an in-band kill), so the task never outlives the server.
pub async fn cancel_on_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
        () = shutdown.cancelled() => return,
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
    shutdown.cancel();
}
