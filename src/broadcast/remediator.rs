use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::directory::RecipientDirectory;
use crate::metrics::RemediationMetrics;

use super::types::{Channel, Recipient};

/// Statistics for recipient remediation
#[derive(Debug, Default)]
struct RemediatorStats {
    push_deactivated: AtomicU64,
    email_deactivated: AtomicU64,
    noops: AtomicU64,
    failures: AtomicU64,
}

/// Snapshot of remediation statistics
#[derive(Debug, Clone, Serialize)]
pub struct RemediatorStatsSnapshot {
    pub push_deactivated: u64,
    pub email_deactivated: u64,
    pub noops: u64,
    pub failures: u64,
}

/// Deactivates recipients after a permanent delivery failure so future
/// broadcasts skip them.
///
/// Deactivation is a single idempotent point-write keyed by the recipient
/// address: concurrent broadcasts racing to deactivate the same address
/// converge to the same end state, and the losing write is a counted
/// no-op rather than an error.
pub struct RecipientRemediator {
    directory: Arc<dyn RecipientDirectory>,
    stats: RemediatorStats,
}

impl RecipientRemediator {
    pub fn new(directory: Arc<dyn RecipientDirectory>) -> Self {
        Self {
            directory,
            stats: RemediatorStats::default(),
        }
    }

    /// Deactivate one recipient address. Directory failures are logged and
    /// swallowed; remediation never aborts the pipeline that triggered it.
    #[tracing::instrument(
        name = "remediator.deactivate",
        skip(self, recipient),
        fields(channel = %recipient.channel, user_id = %recipient.user_id)
    )]
    pub async fn deactivate(&self, recipient: &Recipient) {
        let result = match recipient.channel {
            Channel::Push => {
                self.directory
                    .set_push_token_active(recipient.user_id, false)
                    .await
            }
            Channel::Email => {
                self.directory
                    .set_email_subscribed(recipient.user_id, false)
                    .await
            }
        };

        match result {
            Ok(true) => {
                match recipient.channel {
                    Channel::Push => self.stats.push_deactivated.fetch_add(1, Ordering::Relaxed),
                    Channel::Email => self.stats.email_deactivated.fetch_add(1, Ordering::Relaxed),
                };
                RemediationMetrics::record_deactivation(recipient.channel.as_str());
                tracing::info!(
                    address = %recipient.address,
                    "Recipient deactivated after permanent delivery failure"
                );
            }
            Ok(false) => {
                self.stats.noops.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    address = %recipient.address,
                    "Recipient already inactive, deactivation is a no-op"
                );
            }
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    address = %recipient.address,
                    error = %e,
                    "Failed to deactivate recipient, will retry on next permanent failure"
                );
            }
        }
    }

    /// Get remediation statistics
    pub fn stats(&self) -> RemediatorStatsSnapshot {
        RemediatorStatsSnapshot {
            push_deactivated: self.stats.push_deactivated.load(Ordering::Relaxed),
            email_deactivated: self.stats.email_deactivated.load(Ordering::Relaxed),
            noops: self.stats.noops.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_deactivate_is_idempotent() {
        let directory = Arc::new(InMemoryDirectory::new());
        let user = Uuid::new_v4();
        directory.add_push_recipient(user, "ExponentPushToken[x]", false);

        let remediator = RecipientRemediator::new(directory.clone());
        let recipient = Recipient::push(user, "ExponentPushToken[x]");

        remediator.deactivate(&recipient).await;
        remediator.deactivate(&recipient).await;

        assert_eq!(directory.push_token_active(user), Some(false));

        // The second call must not double-count the deactivation
        let stats = remediator.stats();
        assert_eq!(stats.push_deactivated, 1);
        assert_eq!(stats.noops, 1);
        assert_eq!(stats.failures, 0);
    }

    #[tokio::test]
    async fn test_deactivate_email_channel() {
        let directory = Arc::new(InMemoryDirectory::new());
        let user = Uuid::new_v4();
        directory.add_email_recipient(user, "user@bounced.example");

        let remediator = RecipientRemediator::new(directory.clone());
        remediator
            .deactivate(&Recipient::email(user, "user@bounced.example"))
            .await;

        assert_eq!(directory.email_subscribed(user), Some(false));
        assert_eq!(remediator.stats().email_deactivated, 1);
    }

    #[tokio::test]
    async fn test_deactivate_unknown_recipient_is_noop() {
        let directory = Arc::new(InMemoryDirectory::new());
        let remediator = RecipientRemediator::new(directory);

        remediator
            .deactivate(&Recipient::push(Uuid::new_v4(), "ExponentPushToken[missing]"))
            .await;

        let stats = remediator.stats();
        assert_eq!(stats.push_deactivated, 0);
        assert_eq!(stats.noops, 1);
    }
}
