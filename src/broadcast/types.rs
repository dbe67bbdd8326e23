use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery channel for a recipient address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Push,
    Email,
}

impl Channel {
    /// Stable label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Push => "push",
            Channel::Email => "email",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single addressable target (one push token or one email address).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Owning user
    pub user_id: Uuid,
    /// Delivery channel the address belongs to
    pub channel: Channel,
    /// Push token or email address
    pub address: String,
    /// Inactive recipients are skipped by every broadcast
    pub active: bool,
}

impl Recipient {
    pub fn push(user_id: Uuid, token: impl Into<String>) -> Self {
        Self {
            user_id,
            channel: Channel::Push,
            address: token.into(),
            active: true,
        }
    }

    pub fn email(user_id: Uuid, address: impl Into<String>) -> Self {
        Self {
            user_id,
            channel: Channel::Email,
            address: address.into(),
            active: true,
        }
    }

    /// Dedup key for recipient lists
    pub fn dedup_key(&self) -> (Channel, &str) {
        (self.channel, self.address.as_str())
    }
}

/// Audience a broadcast is addressed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AudienceSelector {
    /// All active push and email subscribers
    AllSubscribers,
    /// All active push tokens
    AllPushSubscribers,
    /// All active email-list subscribers
    AllEmailSubscribers,
    /// Push tokens of admin users
    AdminsOnly,
    /// A single user's registered addresses
    SingleUser(Uuid),
}

impl AudienceSelector {
    /// Stable label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            AudienceSelector::AllSubscribers => "all_subscribers",
            AudienceSelector::AllPushSubscribers => "all_push",
            AudienceSelector::AllEmailSubscribers => "all_email",
            AudienceSelector::AdminsOnly => "admins_only",
            AudienceSelector::SingleUser(_) => "single_user",
        }
    }
}

/// Content for the email channel of a broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
}

/// Message payload for one broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastMessage {
    /// Push notification title
    pub title: String,
    /// Push notification body
    pub body: String,
    /// Structured payload delivered with the push notification
    #[serde(default)]
    pub data: serde_json::Value,
    /// Email rendering of the same announcement, when the audience
    /// includes email subscribers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailContent>,
}

impl BroadcastMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: serde_json::Value::Null,
            email: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_email(mut self, subject: impl Into<String>, html: impl Into<String>) -> Self {
        self.email = Some(EmailContent {
            subject: subject.into(),
            html: html.into(),
        });
        self
    }
}

/// Ephemeral state for one orchestration run. Not persisted, no replay.
#[derive(Debug, Clone)]
pub struct BroadcastJob {
    pub message: BroadcastMessage,
    pub selector: AudienceSelector,
    pub created_at: DateTime<Utc>,
}

impl BroadcastJob {
    pub fn new(message: BroadcastMessage, selector: AudienceSelector) -> Self {
        Self {
            message,
            selector,
            created_at: Utc::now(),
        }
    }
}

/// Why an address was rejected at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Malformed address, caught locally and never sent
    InvalidAddress,
    /// Provider reported the push target as gone
    DeviceNotRegistered,
    /// Provider refused the message size
    MessageTooBig,
    /// Provider throttled the sender
    MessageRateExceeded,
    /// Email transport returned a bounce-class response
    MailboxUnavailable,
    /// Network or provider outage, the whole chunk was lost
    TransportError,
    /// Anything the provider reports that we do not model explicitly
    Other(String),
}

impl RejectReason {
    /// Permanent rejections feed the remediator; everything else is
    /// transient and must never deactivate a recipient.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            RejectReason::DeviceNotRegistered | RejectReason::MailboxUnavailable
        )
    }

    /// Map a provider error code returned inline with a submission.
    pub fn from_provider_code(code: &str) -> Self {
        match code {
            "DeviceNotRegistered" => RejectReason::DeviceNotRegistered,
            "MessageTooBig" => RejectReason::MessageTooBig,
            "MessageRateExceeded" => RejectReason::MessageRateExceeded,
            other => RejectReason::Other(other.to_string()),
        }
    }

    /// Stable label used in logs and metrics
    pub fn as_str(&self) -> &str {
        match self {
            RejectReason::InvalidAddress => "invalid_address",
            RejectReason::DeviceNotRegistered => "device_not_registered",
            RejectReason::MessageTooBig => "message_too_big",
            RejectReason::MessageRateExceeded => "message_rate_exceeded",
            RejectReason::MailboxUnavailable => "mailbox_unavailable",
            RejectReason::TransportError => "transport_error",
            RejectReason::Other(_) => "other",
        }
    }
}

/// Submission outcome for one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Ok,
    Rejected,
}

/// One per address attempted. Produced by the dispatcher, consumed by the
/// confirmer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionTicket {
    pub recipient: Recipient,
    /// Provider handle for the later receipt lookup. Always `None` for
    /// rejected tickets, and for email acceptances (the email transport
    /// has no receipt phase).
    pub ticket_id: Option<String>,
    pub status: SubmissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
}

impl SubmissionTicket {
    pub fn ok(recipient: Recipient, ticket_id: Option<String>) -> Self {
        Self {
            recipient,
            ticket_id,
            status: SubmissionStatus::Ok,
            reject_reason: None,
        }
    }

    pub fn rejected(recipient: Recipient, reason: RejectReason) -> Self {
        Self {
            recipient,
            ticket_id: None,
            status: SubmissionStatus::Rejected,
            reject_reason: Some(reason),
        }
    }

    /// Whether this ticket is eligible for a receipt lookup
    pub fn awaits_receipt(&self) -> bool {
        self.status == SubmissionStatus::Ok && self.ticket_id.is_some()
    }
}

/// Error kinds reported on a delivery receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptErrorKind {
    /// Push target invalid, remediate
    DeviceNotRegistered,
    /// Transient, no remediation
    MessageTooBig,
    /// Transient, no remediation
    MessageRateExceeded,
    Other(String),
}

impl ReceiptErrorKind {
    pub fn is_permanent(&self) -> bool {
        matches!(self, ReceiptErrorKind::DeviceNotRegistered)
    }

    pub fn from_provider_code(code: &str) -> Self {
        match code {
            "DeviceNotRegistered" => ReceiptErrorKind::DeviceNotRegistered,
            "MessageTooBig" => ReceiptErrorKind::MessageTooBig,
            "MessageRateExceeded" => ReceiptErrorKind::MessageRateExceeded,
            other => ReceiptErrorKind::Other(other.to_string()),
        }
    }

    /// Stable label used in logs and metrics
    pub fn as_str(&self) -> &str {
        match self {
            ReceiptErrorKind::DeviceNotRegistered => "device_not_registered",
            ReceiptErrorKind::MessageTooBig => "message_too_big",
            ReceiptErrorKind::MessageRateExceeded => "message_rate_exceeded",
            ReceiptErrorKind::Other(_) => "other",
        }
    }
}

/// Final provider verdict for a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Delivered,
    Error,
}

/// The provider's delivery verdict, matched back to the originating
/// address via the ticket id. A receipt may simply never arrive; absence
/// means "unknown", not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub ticket_id: String,
    pub status: ReceiptStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ReceiptErrorKind>,
}

/// Terminal per-address delivery state over one broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Pending,
    Submitted,
    RejectedAtSubmission,
    AwaitingReceipt,
    Confirmed,
    ReceiptErrorPermanent,
    ReceiptErrorTransient,
    Unknown,
}

impl DeliveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryState::RejectedAtSubmission
                | DeliveryState::Confirmed
                | DeliveryState::ReceiptErrorPermanent
                | DeliveryState::ReceiptErrorTransient
                | DeliveryState::Unknown
        )
    }
}

/// Returned to broadcast callers once submission (not confirmation)
/// completes.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SubmissionSummary {
    /// Addresses that reached the dispatcher
    pub attempted: usize,
    /// Addresses rejected before or at submission
    pub rejected_immediately: usize,
}

impl SubmissionSummary {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_tickets(tickets: &[SubmissionTicket]) -> Self {
        let rejected = tickets
            .iter()
            .filter(|t| t.status == SubmissionStatus::Rejected)
            .count();
        Self {
            attempted: tickets.len(),
            rejected_immediately: rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_reason_classification() {
        assert!(RejectReason::DeviceNotRegistered.is_permanent());
        assert!(RejectReason::MailboxUnavailable.is_permanent());
        assert!(!RejectReason::TransportError.is_permanent());
        assert!(!RejectReason::MessageRateExceeded.is_permanent());
        assert!(!RejectReason::InvalidAddress.is_permanent());
    }

    #[test]
    fn test_reject_reason_from_provider_code() {
        assert_eq!(
            RejectReason::from_provider_code("DeviceNotRegistered"),
            RejectReason::DeviceNotRegistered
        );
        assert_eq!(
            RejectReason::from_provider_code("InvalidCredentials"),
            RejectReason::Other("InvalidCredentials".to_string())
        );
    }

    #[test]
    fn test_receipt_error_kind_classification() {
        assert!(ReceiptErrorKind::DeviceNotRegistered.is_permanent());
        assert!(!ReceiptErrorKind::MessageTooBig.is_permanent());
        assert!(!ReceiptErrorKind::MessageRateExceeded.is_permanent());
        assert!(!ReceiptErrorKind::Other("Mystery".into()).is_permanent());
    }

    #[test]
    fn test_ticket_receipt_eligibility() {
        let recipient = Recipient::push(Uuid::new_v4(), "ExponentPushToken[abc]");

        let ok = SubmissionTicket::ok(recipient.clone(), Some("t-1".into()));
        assert!(ok.awaits_receipt());

        // Email acceptances carry no ticket id
        let accepted_email = SubmissionTicket::ok(recipient.clone(), None);
        assert!(!accepted_email.awaits_receipt());

        let rejected = SubmissionTicket::rejected(recipient, RejectReason::InvalidAddress);
        assert!(!rejected.awaits_receipt());
        assert!(rejected.ticket_id.is_none());
    }

    #[test]
    fn test_summary_from_tickets() {
        let r = Recipient::push(Uuid::new_v4(), "ExponentPushToken[abc]");
        let tickets = vec![
            SubmissionTicket::ok(r.clone(), Some("t-1".into())),
            SubmissionTicket::rejected(r.clone(), RejectReason::InvalidAddress),
            SubmissionTicket::rejected(r, RejectReason::TransportError),
        ];

        let summary = SubmissionSummary::from_tickets(&tickets);
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.rejected_immediately, 2);
    }

    #[test]
    fn test_terminal_states() {
        assert!(DeliveryState::Confirmed.is_terminal());
        assert!(DeliveryState::Unknown.is_terminal());
        assert!(DeliveryState::RejectedAtSubmission.is_terminal());
        assert!(!DeliveryState::Pending.is_terminal());
        assert!(!DeliveryState::AwaitingReceipt.is_terminal());
    }
}
