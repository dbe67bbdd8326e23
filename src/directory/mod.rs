//! Recipient directory abstraction.
//!
//! The fan-out engine never issues raw queries; it depends only on the
//! operations of this trait. Two backends are provided: an in-memory
//! directory for development and tests, and a PostgreSQL directory for
//! production.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::broadcast::Recipient;
use crate::config::DatabaseConfig;
use crate::postgres::PostgresPool;

mod memory;
mod postgres;

pub use memory::InMemoryDirectory;
pub use postgres::PostgresDirectory;

/// Errors that can occur during directory operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Backend is temporarily unavailable
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Storage of recipient addresses and their lifecycle state.
///
/// Mutations are idempotent point-writes: the `set_*` operations report
/// whether stored state actually changed so callers can distinguish a
/// deactivation from a no-op.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// All active push-token recipients.
    async fn find_active_push_tokens(&self) -> Result<Vec<Recipient>, DirectoryError>;

    /// All active email-list subscribers.
    async fn find_active_email_subscribers(&self) -> Result<Vec<Recipient>, DirectoryError>;

    /// Active push tokens belonging to admin users.
    async fn find_admin_push_tokens(&self) -> Result<Vec<Recipient>, DirectoryError>;

    /// Active addresses registered for one user, across both channels.
    async fn find_recipients_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Recipient>, DirectoryError>;

    /// Flip a user's push token active state. Returns true when the stored
    /// state changed.
    async fn set_push_token_active(
        &self,
        user_id: Uuid,
        active: bool,
    ) -> Result<bool, DirectoryError>;

    /// Flip a user's email subscription state. Returns true when the stored
    /// state changed.
    async fn set_email_subscribed(
        &self,
        user_id: Uuid,
        subscribed: bool,
    ) -> Result<bool, DirectoryError>;

    /// Upsert a user's push token. Most-recent registration wins and an
    /// inactive row is reactivated.
    async fn register_push_token(&self, user_id: Uuid, token: &str) -> Result<(), DirectoryError>;
}

/// Create the directory backend selected by configuration.
///
/// Falls back to the in-memory backend when "postgres" is configured but no
/// pool was supplied.
pub fn create_directory(
    config: &DatabaseConfig,
    pool: Option<Arc<PostgresPool>>,
) -> Arc<dyn RecipientDirectory> {
    match (config.backend.as_str(), pool) {
        ("postgres", Some(pool)) => {
            tracing::info!("Using PostgreSQL recipient directory");
            Arc::new(PostgresDirectory::new(pool))
        }
        ("postgres", None) => {
            tracing::warn!("PostgreSQL directory configured but no pool available, using memory");
            Arc::new(InMemoryDirectory::new())
        }
        _ => {
            tracing::info!("Using in-memory recipient directory");
            Arc::new(InMemoryDirectory::new())
        }
    }
}
