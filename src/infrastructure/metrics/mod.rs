//! Prometheus metrics for the broadcast service.
//!
//! This module provides metrics for monitoring the fan-out pipeline:
//! - Broadcast metrics (runs by selector, recipients resolved)
//! - Submission metrics (tickets by channel and status, chunk calls)
//! - Receipt metrics (fetched receipts by status, lookup failures)
//! - Remediation metrics (deactivations by channel)
//! - Email metrics (sends by outcome)

mod helpers;

pub use helpers::{
    encode_metrics, BroadcastMetrics, EmailMetrics, ReceiptMetrics, RemediationMetrics,
    SubmissionMetrics,
};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "clubhouse";

lazy_static! {
    // ============================================================================
    // Broadcast Metrics
    // ============================================================================

    /// Total broadcast runs by audience selector
    pub static ref BROADCASTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_broadcasts_total", METRIC_PREFIX),
        "Total broadcast runs",
        &["selector"]
    ).unwrap();

    /// Distribution of resolved recipients per broadcast
    pub static ref RECIPIENTS_RESOLVED: Histogram = register_histogram!(
        format!("{}_recipients_resolved", METRIC_PREFIX),
        "Distribution of resolved recipients per broadcast",
        vec![0.0, 1.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0]
    ).unwrap();

    // ============================================================================
    // Submission Metrics
    // ============================================================================

    /// Submission tickets issued, by channel and status
    pub static ref SUBMISSION_TICKETS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_submission_tickets_total", METRIC_PREFIX),
        "Submission tickets issued",
        &["channel", "status"]
    ).unwrap();

    /// Submission rejections by reason
    pub static ref SUBMISSION_REJECTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_submission_rejects_total", METRIC_PREFIX),
        "Submission tickets rejected, by reason",
        &["reason"]
    ).unwrap();

    /// Push chunks submitted to the provider
    pub static ref CHUNKS_SUBMITTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_chunks_submitted_total", METRIC_PREFIX),
        "Push chunks submitted to the provider"
    ).unwrap();

    /// Push chunks that failed at the transport level after retries
    pub static ref CHUNK_TRANSPORT_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_chunk_transport_failures_total", METRIC_PREFIX),
        "Push chunks that failed at the transport level after retries"
    ).unwrap();

    // ============================================================================
    // Receipt Metrics
    // ============================================================================

    /// Delivery receipts fetched, by final status
    pub static ref RECEIPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_receipts_total", METRIC_PREFIX),
        "Delivery receipts fetched, by final status",
        &["status"]
    ).unwrap();

    /// Receipt errors by kind
    pub static ref RECEIPT_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_receipt_errors_total", METRIC_PREFIX),
        "Receipt errors by provider error kind",
        &["kind"]
    ).unwrap();

    /// Receipt lookup calls that failed or timed out
    pub static ref RECEIPT_FETCH_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_receipt_fetch_failures_total", METRIC_PREFIX),
        "Receipt lookup calls that failed or timed out"
    ).unwrap();

    /// Receipt lookup latency per chunk
    pub static ref RECEIPT_FETCH_LATENCY: Histogram = register_histogram!(
        format!("{}_receipt_fetch_latency_seconds", METRIC_PREFIX),
        "Receipt lookup latency per chunk in seconds",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    /// Ticket batches waiting for confirmation
    pub static ref PENDING_CONFIRMATIONS: IntGauge = register_int_gauge!(
        format!("{}_pending_confirmations", METRIC_PREFIX),
        "Ticket batches waiting for confirmation"
    ).unwrap();

    // ============================================================================
    // Remediation Metrics
    // ============================================================================

    /// Recipient deactivations by channel
    pub static ref REMEDIATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_remediations_total", METRIC_PREFIX),
        "Recipient deactivations by channel",
        &["channel"]
    ).unwrap();

    // ============================================================================
    // Email Metrics
    // ============================================================================

    /// Email sends by outcome
    pub static ref EMAIL_SENDS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_email_sends_total", METRIC_PREFIX),
        "Email sends by outcome",
        &["outcome"]
    ).unwrap();
}
