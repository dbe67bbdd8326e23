//! In-memory recipient directory for development and tests.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::broadcast::Recipient;

use super::{DirectoryError, RecipientDirectory};

#[derive(Debug, Clone, Default)]
struct MemberRecord {
    is_admin: bool,
    push: Option<PushRegistration>,
    email: Option<EmailRegistration>,
}

#[derive(Debug, Clone)]
struct PushRegistration {
    token: String,
    active: bool,
}

#[derive(Debug, Clone)]
struct EmailRegistration {
    address: String,
    subscribed: bool,
}

/// Recipient directory backed by a concurrent map.
///
/// One record per user; each holds at most one push registration and one
/// email registration, mirroring the production schema.
#[derive(Default)]
pub struct InMemoryDirectory {
    members: DashMap<Uuid, MemberRecord>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            members: DashMap::new(),
        }
    }

    /// Seed a push recipient (test/dev helper).
    pub fn add_push_recipient(&self, user_id: Uuid, token: &str, is_admin: bool) {
        let mut record = self.members.entry(user_id).or_default();
        record.is_admin = is_admin;
        record.push = Some(PushRegistration {
            token: token.to_string(),
            active: true,
        });
    }

    /// Seed an email recipient (test/dev helper).
    pub fn add_email_recipient(&self, user_id: Uuid, address: &str) {
        let mut record = self.members.entry(user_id).or_default();
        record.email = Some(EmailRegistration {
            address: address.to_string(),
            subscribed: true,
        });
    }

    /// Current push-token active state for a user, if registered.
    pub fn push_token_active(&self, user_id: Uuid) -> Option<bool> {
        self.members
            .get(&user_id)
            .and_then(|r| r.push.as_ref().map(|p| p.active))
    }

    /// Current email subscription state for a user, if registered.
    pub fn email_subscribed(&self, user_id: Uuid) -> Option<bool> {
        self.members
            .get(&user_id)
            .and_then(|r| r.email.as_ref().map(|e| e.subscribed))
    }
}

#[async_trait]
impl RecipientDirectory for InMemoryDirectory {
    async fn find_active_push_tokens(&self) -> Result<Vec<Recipient>, DirectoryError> {
        Ok(self
            .members
            .iter()
            .filter_map(|entry| {
                entry.push.as_ref().and_then(|p| {
                    p.active
                        .then(|| Recipient::push(*entry.key(), p.token.clone()))
                })
            })
            .collect())
    }

    async fn find_active_email_subscribers(&self) -> Result<Vec<Recipient>, DirectoryError> {
        Ok(self
            .members
            .iter()
            .filter_map(|entry| {
                entry.email.as_ref().and_then(|e| {
                    e.subscribed
                        .then(|| Recipient::email(*entry.key(), e.address.clone()))
                })
            })
            .collect())
    }

    async fn find_admin_push_tokens(&self) -> Result<Vec<Recipient>, DirectoryError> {
        Ok(self
            .members
            .iter()
            .filter(|entry| entry.is_admin)
            .filter_map(|entry| {
                entry.push.as_ref().and_then(|p| {
                    p.active
                        .then(|| Recipient::push(*entry.key(), p.token.clone()))
                })
            })
            .collect())
    }

    async fn find_recipients_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Recipient>, DirectoryError> {
        let mut recipients = Vec::new();
        if let Some(record) = self.members.get(&user_id) {
            if let Some(p) = record.push.as_ref().filter(|p| p.active) {
                recipients.push(Recipient::push(user_id, p.token.clone()));
            }
            if let Some(e) = record.email.as_ref().filter(|e| e.subscribed) {
                recipients.push(Recipient::email(user_id, e.address.clone()));
            }
        }
        Ok(recipients)
    }

    async fn set_push_token_active(
        &self,
        user_id: Uuid,
        active: bool,
    ) -> Result<bool, DirectoryError> {
        let mut changed = false;
        if let Some(mut record) = self.members.get_mut(&user_id) {
            if let Some(p) = record.push.as_mut() {
                if p.active != active {
                    p.active = active;
                    changed = true;
                }
            }
        }
        Ok(changed)
    }

    async fn set_email_subscribed(
        &self,
        user_id: Uuid,
        subscribed: bool,
    ) -> Result<bool, DirectoryError> {
        let mut changed = false;
        if let Some(mut record) = self.members.get_mut(&user_id) {
            if let Some(e) = record.email.as_mut() {
                if e.subscribed != subscribed {
                    e.subscribed = subscribed;
                    changed = true;
                }
            }
        }
        Ok(changed)
    }

    async fn register_push_token(&self, user_id: Uuid, token: &str) -> Result<(), DirectoryError> {
        let mut record = self.members.entry(user_id).or_default();
        record.push = Some(PushRegistration {
            token: token.to_string(),
            active: true,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_active_filtering() {
        let dir = InMemoryDirectory::new();
        let alive = Uuid::new_v4();
        let dead = Uuid::new_v4();

        dir.add_push_recipient(alive, "ExponentPushToken[alive]", false);
        dir.add_push_recipient(dead, "ExponentPushToken[dead]", false);
        dir.set_push_token_active(dead, false).await.unwrap();

        let tokens = dir.find_active_push_tokens().await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].user_id, alive);
    }

    #[tokio::test]
    async fn test_admin_lookup() {
        let dir = InMemoryDirectory::new();
        let admin = Uuid::new_v4();
        let member = Uuid::new_v4();

        dir.add_push_recipient(admin, "ExponentPushToken[admin]", true);
        dir.add_push_recipient(member, "ExponentPushToken[member]", false);

        let admins = dir.find_admin_push_tokens().await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].user_id, admin);
    }

    #[tokio::test]
    async fn test_set_active_reports_change() {
        let dir = InMemoryDirectory::new();
        let user = Uuid::new_v4();
        dir.add_push_recipient(user, "ExponentPushToken[x]", false);

        assert!(dir.set_push_token_active(user, false).await.unwrap());
        // Second flip to the same state is a no-op
        assert!(!dir.set_push_token_active(user, false).await.unwrap());
        assert_eq!(dir.push_token_active(user), Some(false));

        // Unknown user is a no-op, not an error
        assert!(!dir
            .set_push_token_active(Uuid::new_v4(), false)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_reregistration_reactivates() {
        let dir = InMemoryDirectory::new();
        let user = Uuid::new_v4();
        dir.add_push_recipient(user, "ExponentPushToken[old]", false);
        dir.set_push_token_active(user, false).await.unwrap();

        dir.register_push_token(user, "ExponentPushToken[new]")
            .await
            .unwrap();

        let tokens = dir.find_active_push_tokens().await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].address, "ExponentPushToken[new]");
    }

    #[tokio::test]
    async fn test_find_recipients_for_user_spans_channels() {
        let dir = InMemoryDirectory::new();
        let user = Uuid::new_v4();
        dir.add_push_recipient(user, "ExponentPushToken[x]", false);
        dir.add_email_recipient(user, "member@club.example");

        let recipients = dir.find_recipients_for_user(user).await.unwrap();
        assert_eq!(recipients.len(), 2);

        dir.set_email_subscribed(user, false).await.unwrap();
        let recipients = dir.find_recipients_for_user(user).await.unwrap();
        assert_eq!(recipients.len(), 1);
    }
}
