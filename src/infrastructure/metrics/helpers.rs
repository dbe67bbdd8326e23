//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    BROADCASTS_TOTAL, CHUNKS_SUBMITTED_TOTAL, CHUNK_TRANSPORT_FAILURES_TOTAL, EMAIL_SENDS_TOTAL,
    PENDING_CONFIRMATIONS, RECEIPTS_TOTAL, RECEIPT_ERRORS_TOTAL, RECEIPT_FETCH_FAILURES_TOTAL,
    RECEIPT_FETCH_LATENCY, RECIPIENTS_RESOLVED, REMEDIATIONS_TOTAL, SUBMISSION_REJECTS_TOTAL,
    SUBMISSION_TICKETS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording broadcast metrics
pub struct BroadcastMetrics;

impl BroadcastMetrics {
    /// Record a broadcast run for the given selector label
    pub fn record_run(selector: &str) {
        BROADCASTS_TOTAL.with_label_values(&[selector]).inc();
    }

    /// Record the number of recipients a broadcast resolved to
    pub fn record_resolved(count: usize) {
        RECIPIENTS_RESOLVED.observe(count as f64);
    }
}

/// Helper struct for recording submission metrics
pub struct SubmissionMetrics;

impl SubmissionMetrics {
    /// Record an accepted submission ticket
    pub fn record_ok(channel: &str) {
        SUBMISSION_TICKETS_TOTAL
            .with_label_values(&[channel, "ok"])
            .inc();
    }

    /// Record a rejected submission ticket with its reason label
    pub fn record_rejected(channel: &str, reason: &str) {
        SUBMISSION_TICKETS_TOTAL
            .with_label_values(&[channel, "rejected"])
            .inc();
        SUBMISSION_REJECTS_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record a chunk submitted to the provider
    pub fn record_chunk() {
        CHUNKS_SUBMITTED_TOTAL.inc();
    }

    /// Record a chunk lost to transport failure after retries
    pub fn record_chunk_transport_failure() {
        CHUNK_TRANSPORT_FAILURES_TOTAL.inc();
    }
}

/// Helper struct for recording receipt metrics
pub struct ReceiptMetrics;

impl ReceiptMetrics {
    /// Record a fetched receipt by final status
    pub fn record_receipt(status: &str) {
        RECEIPTS_TOTAL.with_label_values(&[status]).inc();
    }

    /// Record a receipt error kind
    pub fn record_error_kind(kind: &str) {
        RECEIPT_ERRORS_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record a failed or timed-out receipt lookup
    pub fn record_fetch_failure() {
        RECEIPT_FETCH_FAILURES_TOTAL.inc();
    }

    /// Record receipt lookup latency for one chunk
    pub fn record_fetch_latency(seconds: f64) {
        RECEIPT_FETCH_LATENCY.observe(seconds);
    }

    /// Update the pending confirmation batch gauge
    pub fn set_pending(count: usize) {
        PENDING_CONFIRMATIONS.set(count as i64);
    }
}

/// Helper struct for recording remediation metrics
pub struct RemediationMetrics;

impl RemediationMetrics {
    /// Record a recipient deactivation
    pub fn record_deactivation(channel: &str) {
        REMEDIATIONS_TOTAL.with_label_values(&[channel]).inc();
    }
}

/// Helper struct for recording email metrics
pub struct EmailMetrics;

impl EmailMetrics {
    /// Record an accepted email send
    pub fn record_accepted() {
        EMAIL_SENDS_TOTAL.with_label_values(&["accepted"]).inc();
    }

    /// Record a bounced email send
    pub fn record_bounced() {
        EMAIL_SENDS_TOTAL.with_label_values(&["bounced"]).inc();
    }

    /// Record an email transport error
    pub fn record_transport_error() {
        EMAIL_SENDS_TOTAL
            .with_label_values(&["transport_error"])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics() {
        BroadcastMetrics::record_run("admins_only");
        SubmissionMetrics::record_ok("push");

        let encoded = encode_metrics().unwrap();
        assert!(encoded.contains("clubhouse_broadcasts_total"));
    }

    #[test]
    fn test_pending_gauge() {
        ReceiptMetrics::set_pending(3);
        assert_eq!(PENDING_CONFIRMATIONS.get(), 3);
        ReceiptMetrics::set_pending(0);
        assert_eq!(PENDING_CONFIRMATIONS.get(), 0);
    }
}
