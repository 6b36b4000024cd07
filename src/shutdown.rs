use tokio_util::sync::CancellationToken;
use tracing::info;

/// Coordinates graceful shutdown across the folder monitor, in-flight
/// transfers and event handlers
///
/// Usage:
/// ```no_run
/// use ftp_relay::shutdown::ShutdownCoordinator;
///
/// # async fn example() {
/// let coordinator = ShutdownCoordinator::new();
///
/// // Hand a child token to anything that loops:
/// let token = coordinator.child_token();
/// std::thread::spawn(move || {
///     while !token.is_cancelled() {
///         // poll, transfer a chunk, ...
///     }
/// });
///
/// coordinator.wait_for_signal().await;
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Token cancelled when shutdown is triggered; cancelling the child does
    /// not affect the coordinator
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown has been triggered
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Waits for Ctrl-C (or an earlier `shutdown()`), then triggers shutdown
    pub async fn wait_for_signal(&self) {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Received Ctrl-C, shutting down"),
                    Err(e) => info!(error = %e, "Signal handler failed, shutting down"),
                }
                self.shutdown();
            }
            _ = self.token.cancelled() => {}
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
