use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;

use crate::backoff::{BackoffConfig, ExponentialBackoff};
use crate::config::{BroadcastConfig, EmailConfig, PushProviderConfig};
use crate::metrics::{EmailMetrics, SubmissionMetrics};
use crate::providers::{
    EmailSendOutcome, EmailTransport, PushClient, PushMessage, PushProviderError, PushTicket,
    PushTicketStatus,
};

use super::remediator::RecipientRemediator;
use super::types::{BroadcastMessage, Channel, Recipient, RejectReason, SubmissionTicket};

/// Configuration for batch submission
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Maximum addresses per push submission call
    pub push_chunk_size: usize,
    /// Maximum chunks in flight at once
    pub max_concurrent_chunks: usize,
    /// Maximum per-address email sends in flight at once
    pub max_concurrent_emails: usize,
    /// Total submission attempts per chunk (1 = no retry)
    pub submit_attempts: u32,
    /// Backoff between submission attempts
    pub backoff: BackoffConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            push_chunk_size: 100,
            max_concurrent_chunks: 4,
            max_concurrent_emails: 8,
            submit_attempts: 2,
            backoff: BackoffConfig::default(),
        }
    }
}

impl DispatchConfig {
    pub fn from_settings(
        push: &PushProviderConfig,
        email: &EmailConfig,
        broadcast: &BroadcastConfig,
    ) -> Self {
        Self {
            push_chunk_size: push.chunk_size,
            max_concurrent_chunks: broadcast.max_concurrent_chunks,
            max_concurrent_emails: email.max_concurrent_sends,
            submit_attempts: broadcast.submit_attempts,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Statistics for the batch dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Push tickets accepted by the provider
    pub push_accepted: AtomicU64,
    /// Push tickets rejected (validation, inline, or transport)
    pub push_rejected: AtomicU64,
    /// Emails accepted by the relay
    pub email_accepted: AtomicU64,
    /// Emails rejected (validation, bounce, or transport)
    pub email_rejected: AtomicU64,
    /// Chunks submitted to the provider
    pub chunks_submitted: AtomicU64,
    /// Chunks lost to transport failures after retries
    pub chunks_failed: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            push_accepted: self.push_accepted.load(Ordering::Relaxed),
            push_rejected: self.push_rejected.load(Ordering::Relaxed),
            email_accepted: self.email_accepted.load(Ordering::Relaxed),
            email_rejected: self.email_rejected.load(Ordering::Relaxed),
            chunks_submitted: self.chunks_submitted.load(Ordering::Relaxed),
            chunks_failed: self.chunks_failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub push_accepted: u64,
    pub push_rejected: u64,
    pub email_accepted: u64,
    pub email_rejected: u64,
    pub chunks_submitted: u64,
    pub chunks_failed: u64,
}

/// Splits an address list into provider-sized chunks and submits each one,
/// collecting exactly one [`SubmissionTicket`] per address.
///
/// Chunks are independent: a transport failure in one chunk rejects only
/// that chunk's addresses and never its siblings. Permanent provider-level
/// rejections (push `DeviceNotRegistered`, email bounces) feed the
/// remediator inline; transport failures never do.
pub struct BatchDispatcher {
    push_client: Arc<dyn PushClient>,
    email_transport: Arc<dyn EmailTransport>,
    remediator: Arc<RecipientRemediator>,
    config: DispatchConfig,
    stats: DispatcherStats,
}

impl BatchDispatcher {
    pub fn new(
        push_client: Arc<dyn PushClient>,
        email_transport: Arc<dyn EmailTransport>,
        remediator: Arc<RecipientRemediator>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            push_client,
            email_transport,
            remediator,
            config,
            stats: DispatcherStats::default(),
        }
    }

    /// Get dispatcher statistics
    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Submit a message to every recipient, returning one ticket per
    /// address. Never fails as a whole: all failures are contained in
    /// rejected tickets.
    #[tracing::instrument(
        name = "dispatcher.submit",
        skip(self, message, recipients),
        fields(recipient_count = recipients.len())
    )]
    pub async fn submit(
        &self,
        message: &BroadcastMessage,
        recipients: Vec<Recipient>,
    ) -> Vec<SubmissionTicket> {
        let (push, email): (Vec<_>, Vec<_>) = recipients
            .into_iter()
            .partition(|r| r.channel == Channel::Push);

        let mut tickets = self.submit_push(message, push).await;
        tickets.extend(self.submit_email(message, email).await);

        tracing::debug!(
            tickets = tickets.len(),
            rejected = tickets.iter().filter(|t| t.reject_reason.is_some()).count(),
            "Submission completed"
        );

        tickets
    }

    // ========================================================================
    // Push path
    // ========================================================================

    async fn submit_push(
        &self,
        message: &BroadcastMessage,
        recipients: Vec<Recipient>,
    ) -> Vec<SubmissionTicket> {
        if recipients.is_empty() {
            return Vec::new();
        }

        let mut tickets = Vec::with_capacity(recipients.len());
        let mut valid = Vec::with_capacity(recipients.len());

        for recipient in recipients {
            if self.push_client.validate_address(&recipient.address) {
                valid.push(recipient);
            } else {
                tracing::warn!(
                    address = %recipient.address,
                    "Push token failed validation, rejected before submission"
                );
                self.stats.push_rejected.fetch_add(1, Ordering::Relaxed);
                SubmissionMetrics::record_rejected("push", "invalid_address");
                tickets.push(SubmissionTicket::rejected(
                    recipient,
                    RejectReason::InvalidAddress,
                ));
            }
        }

        // Fixed-size chunks preserving input order. Chunks are submitted
        // concurrently up to the configured limit; completion order does
        // not matter because every ticket carries its recipient.
        let chunks: Vec<Vec<Recipient>> = valid
            .chunks(self.config.push_chunk_size)
            .map(|c| c.to_vec())
            .collect();

        let mut chunk_iter = chunks.into_iter().enumerate();
        let mut in_flight = FuturesUnordered::new();

        loop {
            while in_flight.len() < self.config.max_concurrent_chunks {
                match chunk_iter.next() {
                    Some((index, chunk)) => {
                        in_flight.push(self.submit_push_chunk(message, index, chunk))
                    }
                    None => break,
                }
            }

            match in_flight.next().await {
                Some(chunk_tickets) => tickets.extend(chunk_tickets),
                None => break,
            }
        }

        tickets
    }

    async fn submit_push_chunk(
        &self,
        message: &BroadcastMessage,
        chunk_index: usize,
        chunk: Vec<Recipient>,
    ) -> Vec<SubmissionTicket> {
        let messages: Vec<PushMessage> = chunk
            .iter()
            .map(|r| {
                PushMessage::new(&r.address, &message.title, &message.body)
                    .with_data(message.data.clone())
            })
            .collect();

        match self.send_chunk_with_retry(&messages).await {
            Ok(provider_tickets) => {
                self.stats.chunks_submitted.fetch_add(1, Ordering::Relaxed);
                SubmissionMetrics::record_chunk();
                self.collect_chunk_tickets(chunk, provider_tickets).await
            }
            Err(e) => {
                // The whole call was lost; sibling chunks are unaffected.
                // Transport failures are transient and never remediated.
                self.stats.chunks_failed.fetch_add(1, Ordering::Relaxed);
                SubmissionMetrics::record_chunk_transport_failure();
                tracing::warn!(
                    chunk_index,
                    chunk_size = chunk.len(),
                    error = %e,
                    "Chunk submission failed at the transport level"
                );
                chunk
                    .into_iter()
                    .map(|recipient| {
                        self.stats.push_rejected.fetch_add(1, Ordering::Relaxed);
                        SubmissionMetrics::record_rejected("push", "transport_error");
                        SubmissionTicket::rejected(recipient, RejectReason::TransportError)
                    })
                    .collect()
            }
        }
    }

    async fn send_chunk_with_retry(
        &self,
        messages: &[PushMessage],
    ) -> Result<Vec<PushTicket>, PushProviderError> {
        let attempts = self.config.submit_attempts.max(1);
        let mut backoff = ExponentialBackoff::with_config(self.config.backoff.clone());
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.push_client.send_batch(messages).await {
                Ok(tickets) => return Ok(tickets),
                Err(e) if attempt < attempts => {
                    tracing::debug!(
                        attempt,
                        error = %e,
                        "Chunk submission attempt failed, retrying"
                    );
                    tokio::time::sleep(backoff.next_delay()).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Map the provider's positional tickets back onto the chunk's
    /// recipients. Inline permanent rejections are remediated here.
    async fn collect_chunk_tickets(
        &self,
        chunk: Vec<Recipient>,
        provider_tickets: Vec<PushTicket>,
    ) -> Vec<SubmissionTicket> {
        let mut tickets = Vec::with_capacity(chunk.len());

        for (recipient, provider_ticket) in chunk.into_iter().zip(provider_tickets) {
            match provider_ticket.status {
                PushTicketStatus::Ok => {
                    self.stats.push_accepted.fetch_add(1, Ordering::Relaxed);
                    SubmissionMetrics::record_ok("push");
                    tickets.push(SubmissionTicket::ok(recipient, provider_ticket.ticket_id));
                }
                PushTicketStatus::Error => {
                    let reason = provider_ticket
                        .error_code
                        .as_deref()
                        .map(RejectReason::from_provider_code)
                        .unwrap_or_else(|| RejectReason::Other("unspecified".to_string()));

                    tracing::warn!(
                        address = %recipient.address,
                        reason = reason.as_str(),
                        "Provider rejected address at submission"
                    );
                    self.stats.push_rejected.fetch_add(1, Ordering::Relaxed);
                    SubmissionMetrics::record_rejected("push", reason.as_str());

                    // Provider-level permanent rejections deactivate the
                    // recipient immediately, unlike transport failures.
                    if reason.is_permanent() {
                        self.remediator.deactivate(&recipient).await;
                    }

                    tickets.push(SubmissionTicket::rejected(recipient, reason));
                }
            }
        }

        tickets
    }

    // ========================================================================
    // Email path
    // ========================================================================

    async fn submit_email(
        &self,
        message: &BroadcastMessage,
        recipients: Vec<Recipient>,
    ) -> Vec<SubmissionTicket> {
        if recipients.is_empty() {
            return Vec::new();
        }

        let Some(content) = message.email.as_ref() else {
            tracing::warn!(
                count = recipients.len(),
                "Broadcast reached email recipients without email content"
            );
            return recipients
                .into_iter()
                .map(|recipient| {
                    self.stats.email_rejected.fetch_add(1, Ordering::Relaxed);
                    SubmissionMetrics::record_rejected("email", "other");
                    SubmissionTicket::rejected(
                        recipient,
                        RejectReason::Other("missing email content".to_string()),
                    )
                })
                .collect();
        };

        let mut tickets = Vec::with_capacity(recipients.len());
        let mut valid = Vec::with_capacity(recipients.len());

        for recipient in recipients {
            if self.email_transport.validate_address(&recipient.address) {
                valid.push(recipient);
            } else {
                tracing::warn!(
                    address = %recipient.address,
                    "Email address failed validation, rejected before submission"
                );
                self.stats.email_rejected.fetch_add(1, Ordering::Relaxed);
                SubmissionMetrics::record_rejected("email", "invalid_address");
                tickets.push(SubmissionTicket::rejected(
                    recipient,
                    RejectReason::InvalidAddress,
                ));
            }
        }

        // The relay takes one message per call; sends run concurrently up
        // to the configured limit.
        let mut send_iter = valid.into_iter();
        let mut in_flight = FuturesUnordered::new();

        loop {
            while in_flight.len() < self.config.max_concurrent_emails {
                match send_iter.next() {
                    Some(recipient) => {
                        let transport = self.email_transport.clone();
                        let subject = content.subject.clone();
                        let html = content.html.clone();
                        in_flight.push(async move {
                            let outcome =
                                transport.send_one(&recipient.address, &subject, &html).await;
                            (recipient, outcome)
                        });
                    }
                    None => break,
                }
            }

            match in_flight.next().await {
                Some((recipient, outcome)) => {
                    tickets.push(self.classify_email_outcome(recipient, outcome).await)
                }
                None => break,
            }
        }

        tickets
    }

    async fn classify_email_outcome(
        &self,
        recipient: Recipient,
        outcome: EmailSendOutcome,
    ) -> SubmissionTicket {
        match outcome {
            EmailSendOutcome::Accepted => {
                self.stats.email_accepted.fetch_add(1, Ordering::Relaxed);
                EmailMetrics::record_accepted();
                SubmissionMetrics::record_ok("email");
                // No receipt phase for email, so no ticket id
                SubmissionTicket::ok(recipient, None)
            }
            EmailSendOutcome::Bounced(reason) => {
                tracing::warn!(
                    address = %recipient.address,
                    reason = %reason,
                    "Email bounced, deactivating subscriber"
                );
                self.stats.email_rejected.fetch_add(1, Ordering::Relaxed);
                EmailMetrics::record_bounced();
                SubmissionMetrics::record_rejected("email", "mailbox_unavailable");
                // Bounces are the email channel's permanent failure and
                // surface inline rather than through receipts.
                self.remediator.deactivate(&recipient).await;
                SubmissionTicket::rejected(recipient, RejectReason::MailboxUnavailable)
            }
            EmailSendOutcome::TransportError(reason) => {
                tracing::warn!(
                    address = %recipient.address,
                    reason = %reason,
                    "Email transport error"
                );
                self.stats.email_rejected.fetch_add(1, Ordering::Relaxed);
                EmailMetrics::record_transport_error();
                SubmissionMetrics::record_rejected("email", "transport_error");
                SubmissionTicket::rejected(recipient, RejectReason::TransportError)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::SubmissionStatus;
    use crate::directory::InMemoryDirectory;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct StubPushClient {
        calls: Mutex<Vec<usize>>,
    }

    impl StubPushClient {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PushClient for StubPushClient {
        fn validate_address(&self, token: &str) -> bool {
            token.starts_with("ExponentPushToken[") && token.ends_with(']')
        }

        async fn send_batch(
            &self,
            messages: &[PushMessage],
        ) -> Result<Vec<PushTicket>, PushProviderError> {
            self.calls.lock().unwrap().push(messages.len());
            Ok(messages
                .iter()
                .map(|m| PushTicket {
                    address: m.to.clone(),
                    ticket_id: Some(format!("t-{}", m.to)),
                    status: PushTicketStatus::Ok,
                    error_code: None,
                })
                .collect())
        }

        async fn fetch_receipts(
            &self,
            _ticket_ids: &[String],
        ) -> Result<Vec<crate::providers::PushReceipt>, PushProviderError> {
            Ok(Vec::new())
        }
    }

    struct StubEmailTransport;

    #[async_trait]
    impl EmailTransport for StubEmailTransport {
        fn validate_address(&self, address: &str) -> bool {
            address.contains('@')
        }

        async fn send_one(&self, _to: &str, _subject: &str, _html: &str) -> EmailSendOutcome {
            EmailSendOutcome::Accepted
        }
    }

    fn test_dispatcher(push_client: Arc<dyn PushClient>) -> BatchDispatcher {
        let remediator = Arc::new(RecipientRemediator::new(Arc::new(InMemoryDirectory::new())));
        let config = DispatchConfig {
            push_chunk_size: 10,
            submit_attempts: 1,
            ..Default::default()
        };
        BatchDispatcher::new(push_client, Arc::new(StubEmailTransport), remediator, config)
    }

    #[tokio::test]
    async fn test_invalid_push_token_is_rejected_locally() {
        let client = Arc::new(StubPushClient::new());
        let dispatcher = test_dispatcher(client.clone());

        let message = BroadcastMessage::new("Title", "Body");
        let recipients = vec![Recipient::push(Uuid::new_v4(), "garbage-token")];

        let tickets = dispatcher.submit(&message, recipients).await;

        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].status, SubmissionStatus::Rejected);
        assert_eq!(
            tickets[0].reject_reason,
            Some(RejectReason::InvalidAddress)
        );
        // Nothing was sent to the provider
        assert!(client.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chunking_preserves_every_address() {
        let client = Arc::new(StubPushClient::new());
        let dispatcher = test_dispatcher(client.clone());

        let message = BroadcastMessage::new("Title", "Body");
        let recipients: Vec<Recipient> = (0..25)
            .map(|i| Recipient::push(Uuid::new_v4(), format!("ExponentPushToken[{i}]")))
            .collect();

        let tickets = dispatcher.submit(&message, recipients).await;

        assert_eq!(tickets.len(), 25);
        assert!(tickets.iter().all(|t| t.status == SubmissionStatus::Ok));

        let mut calls = client.calls.lock().unwrap().clone();
        calls.sort_unstable();
        assert_eq!(calls, vec![5, 10, 10]);
    }

    #[tokio::test]
    async fn test_email_without_content_is_rejected() {
        let dispatcher = test_dispatcher(Arc::new(StubPushClient::new()));

        let message = BroadcastMessage::new("Title", "Body");
        let recipients = vec![Recipient::email(Uuid::new_v4(), "member@club.example")];

        let tickets = dispatcher.submit(&message, recipients).await;
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].status, SubmissionStatus::Rejected);
    }

    #[tokio::test]
    async fn test_email_accepted_has_no_ticket_id() {
        let dispatcher = test_dispatcher(Arc::new(StubPushClient::new()));

        let message =
            BroadcastMessage::new("Title", "Body").with_email("Subject", "<p>hello</p>");
        let recipients = vec![Recipient::email(Uuid::new_v4(), "member@club.example")];

        let tickets = dispatcher.submit(&message, recipients).await;
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].status, SubmissionStatus::Ok);
        assert!(tickets[0].ticket_id.is_none());
        assert!(!tickets[0].awaits_receipt());
    }
}
