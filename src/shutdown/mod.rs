//! Graceful shutdown handling for the broadcast service.
//!
//! Coordinates the stop sequence:
//! 1. Signal background tasks to stop
//! 2. Wait for the confirmation queue to drain (the worker drains it on
//!    receiving the signal)
//!
//! An abrupt stop loses the pending confirmation round; permanently
//! invalid addresses are remediated on the next broadcast instead.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;

use crate::broadcast::ConfirmationQueue;

/// Configuration for graceful shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Time to wait for the confirmation queue to drain (default: 10 seconds)
    pub drain_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(10),
        }
    }
}

/// Handles graceful shutdown of the broadcast service
pub struct GracefulShutdown {
    confirmation_queue: Arc<ConfirmationQueue>,
    shutdown_tx: broadcast::Sender<()>,
    config: ShutdownConfig,
}

impl GracefulShutdown {
    /// Create a new graceful shutdown handler
    pub fn new(
        confirmation_queue: Arc<ConfirmationQueue>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            confirmation_queue,
            shutdown_tx,
            config: ShutdownConfig::default(),
        }
    }

    /// Create with custom configuration
    pub fn with_config(
        confirmation_queue: Arc<ConfirmationQueue>,
        shutdown_tx: broadcast::Sender<()>,
        config: ShutdownConfig,
    ) -> Self {
        Self {
            confirmation_queue,
            shutdown_tx,
            config,
        }
    }

    /// Execute the graceful shutdown sequence
    #[tracing::instrument(name = "graceful_shutdown", skip(self))]
    pub async fn execute(&self, reason: &str) -> ShutdownResult {
        let start = std::time::Instant::now();
        let mut result = ShutdownResult::default();

        // Phase 1: Signal background tasks to stop
        tracing::info!(reason = %reason, "Starting graceful shutdown - signaling background tasks");
        let _ = self.shutdown_tx.send(());

        // Phase 2: Wait for the confirmation queue to drain
        tracing::info!("Waiting for pending confirmations to drain");
        result.queue_drained = self.wait_for_drain().await;

        result.duration = start.elapsed();
        result.success = true;

        tracing::info!(
            queue_drained = result.queue_drained,
            duration_ms = result.duration.as_millis(),
            "Graceful shutdown completed"
        );

        result
    }

    async fn wait_for_drain(&self) -> bool {
        if self.confirmation_queue.is_empty().await {
            return true;
        }

        let queue = self.confirmation_queue.clone();
        let drain_future = async {
            loop {
                tokio::time::sleep(Duration::from_millis(100)).await;
                if queue.is_empty().await {
                    break;
                }
            }
        };

        match timeout(self.config.drain_timeout, drain_future).await {
            Ok(_) => {
                tracing::info!("Confirmation queue drained");
                true
            }
            Err(_) => {
                let remaining = self.confirmation_queue.len().await;
                tracing::warn!(
                    remaining_batches = remaining,
                    "Drain timeout, pending confirmations will be lost"
                );
                false
            }
        }
    }
}

/// Result of a graceful shutdown operation
#[derive(Debug, Default)]
pub struct ShutdownResult {
    /// Whether shutdown completed successfully
    pub success: bool,
    /// Whether the confirmation queue was fully drained
    pub queue_drained: bool,
    /// Total time taken for shutdown
    pub duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::PendingConfirmation;

    #[tokio::test]
    async fn test_shutdown_with_empty_queue() {
        let queue = Arc::new(ConfirmationQueue::new());
        let (tx, _rx) = broadcast::channel(1);
        let shutdown = GracefulShutdown::new(queue, tx);

        let result = shutdown.execute("test shutdown").await;

        assert!(result.success);
        assert!(result.queue_drained);
    }

    #[tokio::test]
    async fn test_shutdown_times_out_when_nothing_drains() {
        let queue = Arc::new(ConfirmationQueue::new());
        queue
            .push(PendingConfirmation::new(Vec::new(), Duration::ZERO))
            .await;

        let (tx, _rx) = broadcast::channel(1);
        let config = ShutdownConfig {
            drain_timeout: Duration::from_millis(200),
        };
        let shutdown = GracefulShutdown::with_config(queue, tx, config);

        // No worker is running, so the batch never drains
        let result = shutdown.execute("test shutdown").await;
        assert!(!result.queue_drained);
    }

    #[test]
    fn test_shutdown_config_defaults() {
        let config = ShutdownConfig::default();
        assert_eq!(config.drain_timeout, Duration::from_secs(10));
    }
}
