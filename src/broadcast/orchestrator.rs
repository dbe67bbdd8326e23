use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::directory::DirectoryError;
use crate::metrics::BroadcastMetrics;

use super::confirmer::DeliveryConfirmer;
use super::dispatcher::BatchDispatcher;
use super::queue::{ConfirmationQueue, PendingConfirmation};
use super::remediator::RecipientRemediator;
use super::resolver::RecipientResolver;
use super::types::{
    AudienceSelector, BroadcastJob, BroadcastMessage, DeliveryReceipt, DeliveryState,
    ReceiptStatus, Recipient, SubmissionSummary,
};

/// Outcome of one confirmation round, for logging and stats.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ConfirmationOutcome {
    /// Receipts confirming delivery
    pub confirmed: usize,
    /// Permanent receipt errors (remediated)
    pub permanent_errors: usize,
    /// Transient receipt errors (not remediated)
    pub transient_errors: usize,
    /// Tickets with no receipt inside the wait window
    pub unknown: usize,
}

/// The fan-out façade: drives resolver → dispatcher → (detached)
/// confirmer → remediator.
///
/// `broadcast` returns as soon as submission completes; the caller-visible
/// contract is "message handed to the provider", not "message delivered".
/// The receipt phase is queued and may be lost entirely on restart, at
/// worst delaying remediation until the next broadcast.
pub struct NotificationOrchestrator {
    resolver: RecipientResolver,
    dispatcher: Arc<BatchDispatcher>,
    confirmer: Arc<DeliveryConfirmer>,
    remediator: Arc<RecipientRemediator>,
    queue: Arc<ConfirmationQueue>,
    receipt_delay: Duration,
}

impl NotificationOrchestrator {
    pub fn new(
        resolver: RecipientResolver,
        dispatcher: Arc<BatchDispatcher>,
        confirmer: Arc<DeliveryConfirmer>,
        remediator: Arc<RecipientRemediator>,
        queue: Arc<ConfirmationQueue>,
        receipt_delay: Duration,
    ) -> Self {
        Self {
            resolver,
            dispatcher,
            confirmer,
            remediator,
            queue,
            receipt_delay,
        }
    }

    /// Broadcast a message to the selected audience.
    ///
    /// Fails only when recipient resolution itself fails; submission and
    /// delivery failures downstream are contained in tickets and never
    /// surface to the caller.
    #[tracing::instrument(
        name = "orchestrator.broadcast",
        skip(self, message, selector),
        fields(selector = selector.as_str())
    )]
    pub async fn broadcast(
        &self,
        message: BroadcastMessage,
        selector: AudienceSelector,
    ) -> Result<SubmissionSummary, DirectoryError> {
        let job = BroadcastJob::new(message, selector);
        BroadcastMetrics::record_run(job.selector.as_str());

        let recipients = self.resolver.resolve(&job.selector).await?;
        BroadcastMetrics::record_resolved(recipients.len());

        if recipients.is_empty() {
            tracing::info!(
                selector = job.selector.as_str(),
                "Broadcast matched no recipients, nothing to do"
            );
            return Ok(SubmissionSummary::empty());
        }

        let tickets = self.dispatcher.submit(&job.message, recipients).await;
        let summary = SubmissionSummary::from_tickets(&tickets);

        // Hand the receipt phase off the request path. Only tickets with a
        // provider ticket id have anything to confirm.
        let awaiting: Vec<_> = tickets.into_iter().filter(|t| t.awaits_receipt()).collect();
        if !awaiting.is_empty() {
            self.queue
                .push(PendingConfirmation::new(awaiting, self.receipt_delay))
                .await;
        }

        tracing::info!(
            selector = job.selector.as_str(),
            attempted = summary.attempted,
            rejected_immediately = summary.rejected_immediately,
            "Broadcast submitted"
        );

        Ok(summary)
    }

    /// Run confirmation for every batch whose receipt delay has elapsed.
    /// Called periodically by the confirmation worker.
    pub async fn process_due_confirmations(&self) -> usize {
        let mut processed = 0;
        while let Some(batch) = self.queue.pop_due(Utc::now()).await {
            self.run_confirmation(batch).await;
            processed += 1;
        }
        processed
    }

    /// Run confirmation for everything still queued, due or not.
    /// Used on shutdown and in tests.
    pub async fn drain_confirmations(&self) -> usize {
        let batches = self.queue.drain().await;
        let count = batches.len();
        for batch in batches {
            self.run_confirmation(batch).await;
        }
        count
    }

    /// Number of batches still waiting for confirmation.
    pub async fn pending_confirmations(&self) -> usize {
        self.queue.len().await
    }

    /// Fetch receipts for one batch, classify them, and remediate
    /// permanent failures. Absent receipts are counted as unknown.
    #[tracing::instrument(
        name = "orchestrator.confirm_batch",
        skip(self, batch),
        fields(ticket_count = batch.tickets.len())
    )]
    async fn run_confirmation(&self, batch: PendingConfirmation) -> ConfirmationOutcome {
        let receipts = self.confirmer.confirm(&batch.tickets).await;

        let mut awaiting: HashMap<&str, &Recipient> = batch
            .tickets
            .iter()
            .filter_map(|t| t.ticket_id.as_deref().map(|id| (id, &t.recipient)))
            .collect();

        let mut outcome = ConfirmationOutcome::default();

        for receipt in &receipts {
            let Some(recipient) = awaiting.remove(receipt.ticket_id.as_str()) else {
                continue;
            };

            match terminal_state(receipt) {
                DeliveryState::Confirmed => outcome.confirmed += 1,
                DeliveryState::ReceiptErrorPermanent => {
                    outcome.permanent_errors += 1;
                    self.remediator.deactivate(recipient).await;
                }
                _ => outcome.transient_errors += 1,
            }
        }

        // Whatever the provider never answered for stays unknown
        outcome.unknown = awaiting.len();

        tracing::info!(
            confirmed = outcome.confirmed,
            permanent_errors = outcome.permanent_errors,
            transient_errors = outcome.transient_errors,
            unknown = outcome.unknown,
            "Confirmation round completed"
        );

        outcome
    }
}

/// Map a receipt to the address's terminal delivery state.
fn terminal_state(receipt: &DeliveryReceipt) -> DeliveryState {
    match receipt.status {
        ReceiptStatus::Delivered => DeliveryState::Confirmed,
        ReceiptStatus::Error => match &receipt.error_kind {
            Some(kind) if kind.is_permanent() => DeliveryState::ReceiptErrorPermanent,
            _ => DeliveryState::ReceiptErrorTransient,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::ReceiptErrorKind;

    fn receipt(status: ReceiptStatus, error_kind: Option<ReceiptErrorKind>) -> DeliveryReceipt {
        DeliveryReceipt {
            ticket_id: "t-1".to_string(),
            status,
            error_kind,
        }
    }

    #[test]
    fn test_terminal_state_classification() {
        assert_eq!(
            terminal_state(&receipt(ReceiptStatus::Delivered, None)),
            DeliveryState::Confirmed
        );
        assert_eq!(
            terminal_state(&receipt(
                ReceiptStatus::Error,
                Some(ReceiptErrorKind::DeviceNotRegistered)
            )),
            DeliveryState::ReceiptErrorPermanent
        );
        assert_eq!(
            terminal_state(&receipt(
                ReceiptStatus::Error,
                Some(ReceiptErrorKind::MessageRateExceeded)
            )),
            DeliveryState::ReceiptErrorTransient
        );
        // An error receipt with no kind stays transient, never remediated
        assert_eq!(
            terminal_state(&receipt(ReceiptStatus::Error, None)),
            DeliveryState::ReceiptErrorTransient
        );
    }
}

