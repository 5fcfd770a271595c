use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use eyre::Result;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Represents different shutdown reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT or SIGTERM
    Signal,
    /// Requested from inside the process
    Manual,
}

/// Manages graceful shutdown.
///
/// Everything that must stop at shutdown (the refresher, in-flight forwards,
/// the listener) holds the token from [`GracefulShutdown::token`] or a child
/// of it.
pub struct GracefulShutdown {
    token: CancellationToken,
    shutdown_initiated: Arc<AtomicBool>,
    reason: Mutex<Option<ShutdownReason>>,
}

impl GracefulShutdown {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            reason: Mutex::new(None),
        }
    }

    /// The root cancellation token
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Check if shutdown has been initiated
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::Relaxed)
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.lock().ok().and_then(|guard| *guard)
    }

    /// Manually trigger shutdown
    pub fn trigger_shutdown(&self, reason: ShutdownReason) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            tracing::info!("Processing shutdown: {:?}", reason);
            if let Ok(mut guard) = self.reason.lock() {
                *guard = Some(reason);
            }
            self.token.cancel();
        } else {
            tracing::warn!("Shutdown already initiated, ignoring {:?}", reason);
        }
    }

    /// Start listening for OS signals and trigger shutdown on the first one
    pub async fn run_signal_handler(&self) -> Result<()> {
        tracing::info!("Signal handler started. Listening for SIGTERM, SIGINT");

        tokio::select! {
            _ = signal::ctrl_c() => {
                tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
                self.trigger_shutdown(ShutdownReason::Signal);
            }
            _ = Self::wait_for_sigterm() => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown...");
                self.trigger_shutdown(ShutdownReason::Signal);
            }
            _ = self.token.cancelled() => {}
        }

        tracing::info!("Signal handler shutting down");
        Ok(())
    }

    #[cfg(unix)]
    async fn wait_for_sigterm() {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }

    #[cfg(not(unix))]
    async fn wait_for_sigterm() {
        // On non-Unix systems, we only have Ctrl+C
        std::future::pending::<()>().await;
    }

    /// Wait until shutdown has been triggered
    pub async fn wait_for_shutdown_signal(&self) -> ShutdownReason {
        self.token.cancelled().await;
        self.reason().unwrap_or(ShutdownReason::Manual)
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_graceful_shutdown_creation() {
        let shutdown = GracefulShutdown::new();
        assert!(!shutdown.is_shutdown_initiated());
        assert!(!shutdown.token().is_cancelled());
    }

    #[tokio::test]
    async fn test_manual_trigger_cancels_children() {
        let shutdown = GracefulShutdown::new();
        let child = shutdown.token().child_token();

        shutdown.trigger_shutdown(ShutdownReason::Manual);

        assert!(shutdown.is_shutdown_initiated());
        assert!(child.is_cancelled());
        assert_eq!(
            shutdown.wait_for_shutdown_signal().await,
            ShutdownReason::Manual
        );
    }

    #[tokio::test]
    async fn test_first_reason_wins() {
        let shutdown = GracefulShutdown::new();
        shutdown.trigger_shutdown(ShutdownReason::Signal);
        shutdown.trigger_shutdown(ShutdownReason::Manual);
        assert_eq!(shutdown.reason(), Some(ShutdownReason::Signal));
    }

    #[tokio::test]
    async fn test_signal_handler_exits_on_manual_shutdown() {
        let shutdown = Arc::new(GracefulShutdown::new());
        let handler = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.run_signal_handler().await })
        };

        shutdown.trigger_shutdown(ShutdownReason::Manual);
        let result = tokio::time::timeout(Duration::from_secs(1), handler).await;
        assert!(result.is_ok());
    }
}
