//! Email transport.
//!
//! The email provider has no asynchronous receipt phase: the SMTP
//! conversation itself returns the verdict. A permanent (5xx bounce-class)
//! response maps to `Bounced`, which is the email channel's permanent
//! failure and feeds remediation inline; anything else transport-level is
//! transient and never remediated.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::EmailConfig;

/// Errors constructing the SMTP transport.
#[derive(Debug, Error)]
pub enum EmailTransportError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("invalid sender mailbox: {0}")]
    Mailbox(#[from] lettre::address::AddressError),
}

/// Outcome of a single email send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailSendOutcome {
    /// The relay accepted the message
    Accepted,
    /// Bounce-class (permanent) refusal, e.g. mailbox unknown
    Bounced(String),
    /// Network or relay outage, transient
    TransportError(String),
}

/// One-message-at-a-time email sender.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Syntactic address check, performed locally before any network call.
    fn validate_address(&self, address: &str) -> bool;

    /// Send one message and classify the relay's verdict.
    async fn send_one(&self, to: &str, subject: &str, html: &str) -> EmailSendOutcome;
}

/// Production email transport over SMTP.
pub struct SmtpEmailTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailTransport {
    pub fn new(config: &EmailConfig) -> Result<Self, EmailTransportError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = Mailbox::new(
            Some(config.from_name.clone()),
            config.from_address.parse::<Address>()?,
        );

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl EmailTransport for SmtpEmailTransport {
    fn validate_address(&self, address: &str) -> bool {
        address.parse::<Address>().is_ok()
    }

    async fn send_one(&self, to: &str, subject: &str, html: &str) -> EmailSendOutcome {
        // The dispatcher validates addresses before they get here, so a
        // parse failure is a local problem, not a bounce.
        let to_mailbox: Mailbox = match to.parse::<Address>() {
            Ok(address) => Mailbox::new(None, address),
            Err(e) => return EmailSendOutcome::TransportError(format!("unparseable address: {e}")),
        };

        let message = match Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
        {
            Ok(message) => message,
            Err(e) => return EmailSendOutcome::TransportError(format!("message build: {e}")),
        };

        match self.transport.send(message).await {
            Ok(_) => EmailSendOutcome::Accepted,
            Err(e) if e.is_permanent() => EmailSendOutcome::Bounced(e.to_string()),
            Err(e) => EmailSendOutcome::TransportError(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_transport() -> SmtpEmailTransport {
        SmtpEmailTransport::new(&EmailConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_address_validation() {
        let transport = test_transport();
        assert!(transport.validate_address("member@club.example"));
        assert!(!transport.validate_address("not-an-address"));
        assert!(!transport.validate_address("missing@"));
        assert!(!transport.validate_address(""));
    }

    #[test]
    fn test_outcome_equality() {
        assert_eq!(EmailSendOutcome::Accepted, EmailSendOutcome::Accepted);
        assert_ne!(
            EmailSendOutcome::Accepted,
            EmailSendOutcome::Bounced("550".into())
        );
    }
}
