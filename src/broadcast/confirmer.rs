use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{BroadcastConfig, PushProviderConfig};
use crate::metrics::ReceiptMetrics;
use crate::providers::{PushClient, PushReceiptStatus};

use super::types::{DeliveryReceipt, ReceiptErrorKind, ReceiptStatus, SubmissionTicket};

/// Configuration for receipt lookups
#[derive(Debug, Clone)]
pub struct ConfirmConfig {
    /// Maximum ticket ids per receipt lookup call; the provider imposes a
    /// separate limit from the submission chunk size
    pub receipt_chunk_size: usize,
    /// Upper bound on a single receipt-chunk lookup
    pub fetch_timeout: Duration,
}

impl Default for ConfirmConfig {
    fn default() -> Self {
        Self {
            receipt_chunk_size: 300,
            fetch_timeout: Duration::from_secs(5),
        }
    }
}

impl ConfirmConfig {
    pub fn from_settings(push: &PushProviderConfig, broadcast: &BroadcastConfig) -> Self {
        Self {
            receipt_chunk_size: push.receipt_chunk_size,
            fetch_timeout: Duration::from_secs(broadcast.receipt_timeout_seconds),
        }
    }
}

/// Polls the provider for final delivery verdicts on submitted tickets.
///
/// Runs after the orchestrator has already answered its caller, so its own
/// failures are contained: a chunk whose lookup errors or times out is
/// logged and skipped, and its receipts simply stay absent.
pub struct DeliveryConfirmer {
    push_client: Arc<dyn PushClient>,
    config: ConfirmConfig,
}

impl DeliveryConfirmer {
    pub fn new(push_client: Arc<dyn PushClient>, config: ConfirmConfig) -> Self {
        Self {
            push_client,
            config,
        }
    }

    /// Fetch whatever receipts the provider still has for these tickets.
    /// Only tickets with a ticket id are eligible; receipts that never
    /// arrive are absent from the result, not represented as errors.
    #[tracing::instrument(
        name = "confirmer.confirm",
        skip(self, tickets),
        fields(ticket_count = tickets.len())
    )]
    pub async fn confirm(&self, tickets: &[SubmissionTicket]) -> Vec<DeliveryReceipt> {
        let ticket_ids: Vec<String> = tickets
            .iter()
            .filter(|t| t.awaits_receipt())
            .filter_map(|t| t.ticket_id.clone())
            .collect();

        if ticket_ids.is_empty() {
            return Vec::new();
        }

        let mut receipts = Vec::with_capacity(ticket_ids.len());

        for chunk in ticket_ids.chunks(self.config.receipt_chunk_size) {
            let start = Instant::now();
            let lookup = self.push_client.fetch_receipts(chunk);

            match tokio::time::timeout(self.config.fetch_timeout, lookup).await {
                Ok(Ok(chunk_receipts)) => {
                    ReceiptMetrics::record_fetch_latency(start.elapsed().as_secs_f64());
                    for receipt in chunk_receipts {
                        receipts.push(self.convert_receipt(receipt));
                    }
                }
                Ok(Err(e)) => {
                    ReceiptMetrics::record_fetch_failure();
                    tracing::warn!(
                        chunk_size = chunk.len(),
                        error = %e,
                        "Receipt lookup failed for chunk"
                    );
                }
                Err(_) => {
                    ReceiptMetrics::record_fetch_failure();
                    tracing::warn!(
                        chunk_size = chunk.len(),
                        timeout_secs = self.config.fetch_timeout.as_secs(),
                        "Receipt lookup timed out for chunk"
                    );
                }
            }
        }

        tracing::debug!(
            eligible = ticket_ids.len(),
            fetched = receipts.len(),
            "Receipt lookup completed"
        );

        receipts
    }

    fn convert_receipt(&self, receipt: crate::providers::PushReceipt) -> DeliveryReceipt {
        match receipt.status {
            PushReceiptStatus::Ok => {
                ReceiptMetrics::record_receipt("delivered");
                DeliveryReceipt {
                    ticket_id: receipt.ticket_id,
                    status: ReceiptStatus::Delivered,
                    error_kind: None,
                }
            }
            PushReceiptStatus::Error => {
                let kind = receipt
                    .error_code
                    .as_deref()
                    .map(ReceiptErrorKind::from_provider_code)
                    .unwrap_or_else(|| ReceiptErrorKind::Other("unspecified".to_string()));
                ReceiptMetrics::record_receipt("error");
                ReceiptMetrics::record_error_kind(kind.as_str());
                DeliveryReceipt {
                    ticket_id: receipt.ticket_id,
                    status: ReceiptStatus::Error,
                    error_kind: Some(kind),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{Recipient, RejectReason};
    use crate::providers::{PushMessage, PushProviderError, PushReceipt, PushTicket};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct StubReceiptClient {
        calls: Mutex<Vec<usize>>,
        fail_all: bool,
    }

    #[async_trait]
    impl PushClient for StubReceiptClient {
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
            ticket_ids: &[String],
        ) -> Result<Vec<PushReceipt>, PushProviderError> {
            self.calls.lock().unwrap().push(ticket_ids.len());
            if self.fail_all {
                return Err(PushProviderError::UnexpectedStatus(502));
            }
            Ok(ticket_ids
                .iter()
                .map(|id| PushReceipt {
                    ticket_id: id.clone(),
                    status: PushReceiptStatus::Ok,
                    error_code: None,
                })
                .collect())
        }
    }

    fn ok_ticket(id: &str) -> SubmissionTicket {
        SubmissionTicket::ok(
            Recipient::push(Uuid::new_v4(), format!("ExponentPushToken[{id}]")),
            Some(id.to_string()),
        )
    }

    #[tokio::test]
    async fn test_only_eligible_tickets_are_looked_up() {
        let client = Arc::new(StubReceiptClient {
            calls: Mutex::new(Vec::new()),
            fail_all: false,
        });
        let confirmer = DeliveryConfirmer::new(client.clone(), ConfirmConfig::default());

        let tickets = vec![
            ok_ticket("t-1"),
            // Email acceptance: no ticket id, skipped
            SubmissionTicket::ok(Recipient::email(Uuid::new_v4(), "a@b.example"), None),
            // Rejected: skipped
            SubmissionTicket::rejected(
                Recipient::push(Uuid::new_v4(), "ExponentPushToken[x]"),
                RejectReason::InvalidAddress,
            ),
        ];

        let receipts = confirmer.confirm(&tickets).await;
        assert_eq!(receipts.len(), 1);
        assert_eq!(client.calls.lock().unwrap().as_slice(), &[1]);
    }

    #[tokio::test]
    async fn test_receipt_ids_are_chunked_separately() {
        let client = Arc::new(StubReceiptClient {
            calls: Mutex::new(Vec::new()),
            fail_all: false,
        });
        let config = ConfirmConfig {
            receipt_chunk_size: 4,
            ..Default::default()
        };
        let confirmer = DeliveryConfirmer::new(client.clone(), config);

        let tickets: Vec<SubmissionTicket> =
            (0..10).map(|i| ok_ticket(&format!("t-{i}"))).collect();

        let receipts = confirmer.confirm(&tickets).await;
        assert_eq!(receipts.len(), 10);
        assert_eq!(client.calls.lock().unwrap().as_slice(), &[4, 4, 2]);
    }

    #[tokio::test]
    async fn test_lookup_failure_yields_no_receipts() {
        let client = Arc::new(StubReceiptClient {
            calls: Mutex::new(Vec::new()),
            fail_all: true,
        });
        let confirmer = DeliveryConfirmer::new(client, ConfirmConfig::default());

        let tickets = vec![ok_ticket("t-1"), ok_ticket("t-2")];
        let receipts = confirmer.confirm(&tickets).await;

        // Missing receipts mean "unknown", never an error entry
        assert!(receipts.is_empty());
    }

    #[tokio::test]
    async fn test_no_eligible_tickets_skips_network() {
        let client = Arc::new(StubReceiptClient {
            calls: Mutex::new(Vec::new()),
            fail_all: false,
        });
        let confirmer = DeliveryConfirmer::new(client.clone(), ConfirmConfig::default());

        let tickets = vec![SubmissionTicket::ok(
            Recipient::email(Uuid::new_v4(), "a@b.example"),
            None,
        )];
        let receipts = confirmer.confirm(&tickets).await;

        assert!(receipts.is_empty());
        assert!(client.calls.lock().unwrap().is_empty());
    }
}
