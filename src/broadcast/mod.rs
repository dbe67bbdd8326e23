//! Notification fan-out and delivery confirmation.
//!
//! The pipeline is resolver → dispatcher → (detached) confirmer →
//! remediator. Submission is on the caller's path and returns a
//! [`SubmissionSummary`]; the receipt phase runs later off an in-memory
//! confirmation queue and never surfaces errors to the original caller.

mod confirmer;
mod dispatcher;
mod orchestrator;
mod queue;
mod remediator;
mod resolver;
mod types;

pub use confirmer::{ConfirmConfig, DeliveryConfirmer};
pub use dispatcher::{BatchDispatcher, DispatchConfig, DispatcherStats, DispatcherStatsSnapshot};
pub use orchestrator::{ConfirmationOutcome, NotificationOrchestrator};
pub use queue::{ConfirmationQueue, PendingConfirmation};
pub use remediator::{RecipientRemediator, RemediatorStatsSnapshot};
pub use resolver::RecipientResolver;
pub use types::{
    AudienceSelector, BroadcastJob, BroadcastMessage, Channel, DeliveryReceipt, DeliveryState,
    EmailContent, ReceiptErrorKind, ReceiptStatus, Recipient, RejectReason, SubmissionStatus,
    SubmissionSummary, SubmissionTicket,
};
