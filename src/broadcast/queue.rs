//! In-memory confirmation queue.
//!
//! Submitted ticket batches wait here until their receipt delay elapses,
//! then the confirmation worker picks them up. The queue is deliberately
//! not persisted: a restart loses pending batches, and the affected
//! addresses are simply remediated on the next broadcast that hits them.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::metrics::ReceiptMetrics;

use super::types::SubmissionTicket;

/// One submitted batch awaiting its receipt lookup.
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    /// Tickets eligible for a receipt lookup
    pub tickets: Vec<SubmissionTicket>,
    /// When the batch was submitted
    pub submitted_at: DateTime<Utc>,
    /// Earliest time receipts should be fetched
    pub due_at: DateTime<Utc>,
}

impl PendingConfirmation {
    pub fn new(tickets: Vec<SubmissionTicket>, receipt_delay: Duration) -> Self {
        let now = Utc::now();
        let delay =
            chrono::Duration::from_std(receipt_delay).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            tickets,
            submitted_at: now,
            due_at: now + delay,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.due_at
    }
}

/// FIFO queue of pending confirmation batches.
#[derive(Default)]
pub struct ConfirmationQueue {
    inner: Mutex<VecDeque<PendingConfirmation>>,
}

impl ConfirmationQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Enqueue a batch for later confirmation.
    pub async fn push(&self, batch: PendingConfirmation) {
        let mut queue = self.inner.lock().await;
        queue.push_back(batch);
        ReceiptMetrics::set_pending(queue.len());
    }

    /// Take the oldest batch whose receipt delay has elapsed.
    ///
    /// Batches are submitted in order, so the front of the queue is always
    /// the earliest due.
    pub async fn pop_due(&self, now: DateTime<Utc>) -> Option<PendingConfirmation> {
        let mut queue = self.inner.lock().await;
        if queue.front().is_some_and(|batch| batch.is_due(now)) {
            let batch = queue.pop_front();
            ReceiptMetrics::set_pending(queue.len());
            batch
        } else {
            None
        }
    }

    /// Take every batch regardless of due time (shutdown drain).
    pub async fn drain(&self) -> Vec<PendingConfirmation> {
        let mut queue = self.inner.lock().await;
        let batches: Vec<PendingConfirmation> = queue.drain(..).collect();
        ReceiptMetrics::set_pending(0);
        batches
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(receipt_delay: Duration) -> PendingConfirmation {
        PendingConfirmation::new(Vec::new(), receipt_delay)
    }

    #[tokio::test]
    async fn test_pop_due_respects_delay() {
        let queue = ConfirmationQueue::new();
        queue.push(batch(Duration::from_secs(3600))).await;

        assert!(queue.pop_due(Utc::now()).await.is_none());
        assert_eq!(queue.len().await, 1);

        // Due once the clock passes due_at
        let later = Utc::now() + chrono::Duration::hours(2);
        assert!(queue.pop_due(later).await.is_some());
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_pop_due_returns_in_fifo_order() {
        let queue = ConfirmationQueue::new();
        queue.push(batch(Duration::ZERO)).await;
        queue.push(batch(Duration::ZERO)).await;

        let first = queue.pop_due(Utc::now()).await.unwrap();
        let second = queue.pop_due(Utc::now()).await.unwrap();
        assert!(first.submitted_at <= second.submitted_at);
    }

    #[tokio::test]
    async fn test_drain_ignores_due_time() {
        let queue = ConfirmationQueue::new();
        queue.push(batch(Duration::from_secs(3600))).await;
        queue.push(batch(Duration::from_secs(3600))).await;

        let drained = queue.drain().await;
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty().await);
    }
}
