use tokio::select;
use tokio_util::sync::CancellationToken;

/// Turns an interrupt into a cooperative stop of every component. Pollers
/// notice the cancellation at their next interval boundary; the sink stops
/// once the last producer is gone.
pub async fn detect_shutdown(cancellation: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                select! {
                    _ = tokio::signal::ctrl_c() => (),
                    _ = terminate.recv() => (),
                }
            }
            Err(e) => {
                tracing::warn!("Can't listen for SIGTERM {:?}, interrupt only", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    cancellation.cancel();
}
