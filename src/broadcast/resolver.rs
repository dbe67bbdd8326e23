use std::collections::HashSet;
use std::sync::Arc;

use crate::directory::{DirectoryError, RecipientDirectory};

use super::types::{AudienceSelector, Recipient};

/// Turns a broadcast intent into a concrete list of delivery addresses.
pub struct RecipientResolver {
    directory: Arc<dyn RecipientDirectory>,
}

impl RecipientResolver {
    pub fn new(directory: Arc<dyn RecipientDirectory>) -> Self {
        Self { directory }
    }

    /// Resolve a selector to recipients, deduplicated by
    /// `(channel, address)` and guaranteed active. An empty result is a
    /// normal outcome, not an error.
    #[tracing::instrument(
        name = "resolver.resolve",
        skip(self, selector),
        fields(selector = selector.as_str())
    )]
    pub async fn resolve(
        &self,
        selector: &AudienceSelector,
    ) -> Result<Vec<Recipient>, DirectoryError> {
        let raw = match selector {
            AudienceSelector::AllSubscribers => {
                let mut recipients = self.directory.find_active_push_tokens().await?;
                recipients.extend(self.directory.find_active_email_subscribers().await?);
                recipients
            }
            AudienceSelector::AllPushSubscribers => {
                self.directory.find_active_push_tokens().await?
            }
            AudienceSelector::AllEmailSubscribers => {
                self.directory.find_active_email_subscribers().await?
            }
            AudienceSelector::AdminsOnly => self.directory.find_admin_push_tokens().await?,
            AudienceSelector::SingleUser(user_id) => {
                self.directory.find_recipients_for_user(*user_id).await?
            }
        };

        let mut seen = HashSet::new();
        let mut recipients = Vec::with_capacity(raw.len());
        for recipient in raw {
            if !recipient.active {
                continue;
            }
            if seen.insert((recipient.channel, recipient.address.clone())) {
                recipients.push(recipient);
            }
        }

        tracing::debug!(resolved = recipients.len(), "Resolved broadcast audience");

        Ok(recipients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Channel;
    use crate::directory::InMemoryDirectory;
    use uuid::Uuid;

    fn resolver_with(directory: InMemoryDirectory) -> RecipientResolver {
        RecipientResolver::new(Arc::new(directory))
    }

    #[tokio::test]
    async fn test_resolve_all_subscribers_spans_channels() {
        let directory = InMemoryDirectory::new();
        let pusher = Uuid::new_v4();
        let mailer = Uuid::new_v4();
        directory.add_push_recipient(pusher, "ExponentPushToken[a]", false);
        directory.add_email_recipient(mailer, "mailer@club.example");

        let resolver = resolver_with(directory);
        let recipients = resolver
            .resolve(&AudienceSelector::AllSubscribers)
            .await
            .unwrap();

        assert_eq!(recipients.len(), 2);
        assert!(recipients.iter().any(|r| r.channel == Channel::Push));
        assert!(recipients.iter().any(|r| r.channel == Channel::Email));
    }

    #[tokio::test]
    async fn test_resolve_deduplicates_by_channel_and_address() {
        let directory = InMemoryDirectory::new();
        // Two users sharing one inbox must yield a single email recipient
        directory.add_email_recipient(Uuid::new_v4(), "shared@club.example");
        directory.add_email_recipient(Uuid::new_v4(), "shared@club.example");

        let resolver = resolver_with(directory);
        let recipients = resolver
            .resolve(&AudienceSelector::AllEmailSubscribers)
            .await
            .unwrap();

        assert_eq!(recipients.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_excludes_inactive() {
        let directory = InMemoryDirectory::new();
        let active = Uuid::new_v4();
        let inactive = Uuid::new_v4();
        directory.add_push_recipient(active, "ExponentPushToken[a]", false);
        directory.add_push_recipient(inactive, "ExponentPushToken[b]", false);
        directory.set_push_token_active(inactive, false).await.unwrap();

        let resolver = resolver_with(directory);
        let recipients = resolver
            .resolve(&AudienceSelector::AllPushSubscribers)
            .await
            .unwrap();

        assert_eq!(recipients.len(), 1);
        assert!(recipients.iter().all(|r| r.active));
        assert_eq!(recipients[0].user_id, active);
    }

    #[tokio::test]
    async fn test_resolve_empty_is_ok() {
        let resolver = resolver_with(InMemoryDirectory::new());
        let recipients = resolver
            .resolve(&AudienceSelector::AdminsOnly)
            .await
            .unwrap();
        assert!(recipients.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_single_user() {
        let directory = InMemoryDirectory::new();
        let user = Uuid::new_v4();
        directory.add_push_recipient(user, "ExponentPushToken[u]", false);
        directory.add_push_recipient(Uuid::new_v4(), "ExponentPushToken[other]", false);

        let resolver = resolver_with(directory);
        let recipients = resolver
            .resolve(&AudienceSelector::SingleUser(user))
            .await
            .unwrap();

        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].user_id, user);
    }
}
