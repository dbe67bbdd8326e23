//! Third-party delivery channels.
//!
//! Both providers are injected as trait objects, constructed once at
//! process start. The push provider is a two-phase HTTP API (submit
//! tickets, fetch receipts later); the email transport is SMTP and has no
//! receipt phase, so its permanent failures surface inline as
//! bounce-class responses.

pub mod email;
pub mod push;

pub use email::{EmailSendOutcome, EmailTransport, SmtpEmailTransport};
pub use push::{
    HttpPushClient, PushClient, PushMessage, PushProviderError, PushReceipt, PushReceiptStatus,
    PushTicket, PushTicketStatus,
};
