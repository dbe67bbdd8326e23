use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::broadcast::NotificationOrchestrator;

/// Background task that runs the confirmation pipeline for submitted
/// ticket batches once their receipt delay elapses.
///
/// On shutdown the worker drains everything still queued, due or not, so
/// a clean stop does not silently drop a round of receipts. An abrupt
/// stop does lose them, which the pipeline tolerates.
pub struct ConfirmationWorker {
    orchestrator: Arc<NotificationOrchestrator>,
    poll_interval: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl ConfirmationWorker {
    pub fn new(
        orchestrator: Arc<NotificationOrchestrator>,
        poll_interval: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            orchestrator,
            poll_interval,
            shutdown,
        }
    }

    /// Run the confirmation polling loop until shutdown.
    pub async fn run(mut self) {
        let mut timer = tokio::time::interval(self.poll_interval);

        // Skip immediate first tick
        timer.tick().await;

        tracing::info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "Confirmation worker started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Confirmation worker received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    let processed = self.orchestrator.process_due_confirmations().await;
                    if processed > 0 {
                        tracing::debug!(processed, "Processed due confirmation batches");
                    }
                }
            }
        }

        // Best-effort drain so a clean shutdown confirms what it still can
        let drained = self.orchestrator.drain_confirmations().await;
        if drained > 0 {
            tracing::info!(drained, "Drained pending confirmations on shutdown");
        }

        tracing::info!("Confirmation worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{
        BatchDispatcher, ConfirmConfig, ConfirmationQueue, DeliveryConfirmer, DispatchConfig,
        RecipientRemediator, RecipientResolver,
    };
    use crate::directory::InMemoryDirectory;
    use crate::providers::{
        EmailSendOutcome, EmailTransport, PushClient, PushMessage, PushProviderError, PushReceipt,
        PushTicket,
    };
    use async_trait::async_trait;

    struct NoopPushClient;

    #[async_trait]
    impl PushClient for NoopPushClient {
        fn validate_address(&self, _token: &str) -> bool {
            true
        }

        async fn send_batch(
            &self,
            _messages: &[PushMessage],
        ) -> Result<Vec<PushTicket>, PushProviderError> {
            Ok(Vec::new())
        }

        async fn fetch_receipts(
            &self,
            _ticket_ids: &[String],
        ) -> Result<Vec<PushReceipt>, PushProviderError> {
            Ok(Vec::new())
        }
    }

    struct NoopEmailTransport;

    #[async_trait]
    impl EmailTransport for NoopEmailTransport {
        fn validate_address(&self, _address: &str) -> bool {
            true
        }

        async fn send_one(&self, _to: &str, _subject: &str, _html: &str) -> EmailSendOutcome {
            EmailSendOutcome::Accepted
        }
    }

    fn test_orchestrator() -> Arc<NotificationOrchestrator> {
        let directory = Arc::new(InMemoryDirectory::new());
        let push_client: Arc<dyn PushClient> = Arc::new(NoopPushClient);
        let remediator = Arc::new(RecipientRemediator::new(directory.clone()));
        let dispatcher = Arc::new(BatchDispatcher::new(
            push_client.clone(),
            Arc::new(NoopEmailTransport),
            remediator.clone(),
            DispatchConfig::default(),
        ));
        let confirmer = Arc::new(DeliveryConfirmer::new(push_client, ConfirmConfig::default()));

        Arc::new(NotificationOrchestrator::new(
            RecipientResolver::new(directory),
            dispatcher,
            confirmer,
            remediator,
            Arc::new(ConfirmationQueue::new()),
            Duration::ZERO,
        ))
    }

    #[tokio::test]
    async fn test_worker_stops_on_shutdown() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let worker = ConfirmationWorker::new(
            test_orchestrator(),
            Duration::from_millis(50),
            shutdown_rx,
        );

        let handle = tokio::spawn(async move {
            worker.run().await;
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("Worker should stop")
            .expect("Worker should not panic");
    }
}
