// src/server/shutdown.rs
use tokio::sync::watch;
use tracing::info;

/// Resolves once the shutdown flag is set, or when its sender is gone.
pub async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Waits for Ctrl+C or, on unix, SIGTERM.
pub async fn shutdown_signal() -> std::io::Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = ctrl_c => result?,
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await?;

    info!("Shutdown signal received");
    Ok(())
}
