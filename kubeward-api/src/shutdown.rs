//! Graceful shutdown handling
//!
//! Signal handling feeds a watch channel the HTTP server drains on; cleanup
//! then runs under a deadline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{info, warn};

/// Shutdown coordinator for graceful termination
#[derive(Clone)]
pub struct ShutdownCoordinator {
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    is_shutting_down: Arc<AtomicBool>,
    timeout: Duration,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator with default 30s timeout
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            is_shutting_down: Arc::new(AtomicBool::new(false)),
            timeout,
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.is_shutting_down.load(Ordering::SeqCst)
    }

    /// Initiate graceful shutdown
    pub fn shutdown(&self) {
        if self.is_shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Initiating graceful shutdown...");
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for SIGTERM or SIGINT, then trigger shutdown
    pub async fn wait_for_signal(&self) {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(mut sigterm), Ok(mut sigint)) => {
                    tokio::select! {
                        _ = sigterm.recv() => info!("Received SIGTERM"),
                        _ = sigint.recv() => info!("Received SIGINT"),
                    }
                }
                _ => {
                    warn!("Failed to register signal handlers, falling back to Ctrl+C");
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!("Ctrl+C handler failed: {}", e);
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Ctrl+C handler failed: {}", e);
            }
            info!("Received Ctrl+C");
        }

        self.shutdown();
    }

    /// Future that resolves once shutdown has been triggered, for axum
    pub fn signal(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.shutdown_rx.clone();

        async move {
            while !*rx.borrow() {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        }
    }

    /// Run `cleanup`, giving up after the configured timeout
    pub async fn cleanup<Fut>(&self, cleanup: Fut)
    where
        Fut: std::future::Future<Output = ()>,
    {
        match timeout(self.timeout, cleanup).await {
            Ok(()) => info!("Cleanup completed successfully"),
            Err(_) => warn!(
                "Cleanup did not complete within {:?}, forcing exit",
                self.timeout
            ),
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_coordinator() {
        let coordinator = ShutdownCoordinator::new();
        let signal = coordinator.signal();

        assert!(!coordinator.is_shutting_down());

        coordinator.shutdown();
        coordinator.shutdown();

        assert!(coordinator.is_shutting_down());
        tokio::time::timeout(Duration::from_secs(1), signal)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_deadline() {
        let coordinator = ShutdownCoordinator::with_timeout(Duration::from_millis(20));
        let started = std::time::Instant::now();

        coordinator
            .cleanup(tokio::time::sleep(Duration::from_secs(10)))
            .await;

        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
