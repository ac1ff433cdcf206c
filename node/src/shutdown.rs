//! Graceful shutdown for the node's background tasks.
//!
//! Every long-running task subscribes to one broadcast channel and leaves
//! its loop when it fires. Flows in progress are not interrupted; their
//! checkpoints are resumed on the next start.

use tokio::signal;
use tokio::sync::broadcast;

pub struct ShutdownController {
    tx: broadcast::Sender<()>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn shutdown(&self) {
        // No receivers simply means nothing is running.
        let _ = self.tx.send(());
    }

    /// Wait for SIGINT or SIGTERM, then trigger shutdown.
    pub async fn wait_for_signal(&self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            tokio::select! {
                res = signal::ctrl_c() => { res?; tracing::info!("received SIGINT"); }
                _ = terminate.recv() => { tracing::info!("received SIGTERM"); }
            }
        }
        #[cfg(not(unix))]
        {
            signal::ctrl_c().await?;
            tracing::info!("received Ctrl-C");
        }
        self.shutdown();
        Ok(())
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}
