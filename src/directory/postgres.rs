//! PostgreSQL recipient directory.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE push_tokens (
//!     user_id    UUID PRIMARY KEY REFERENCES users(id),
//!     token      TEXT NOT NULL,
//!     active     BOOLEAN NOT NULL DEFAULT TRUE,
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//!
//! CREATE TABLE email_subscribers (
//!     user_id    UUID PRIMARY KEY REFERENCES users(id),
//!     address    TEXT NOT NULL,
//!     subscribed BOOLEAN NOT NULL DEFAULT TRUE,
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! Rows are never deleted; remediation flips the boolean so history is
//! retained for idempotent re-registration.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::broadcast::Recipient;
use crate::postgres::PostgresPool;

use super::{DirectoryError, RecipientDirectory};

pub struct PostgresDirectory {
    pool: Arc<PostgresPool>,
}

impl PostgresDirectory {
    pub fn new(pool: Arc<PostgresPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecipientDirectory for PostgresDirectory {
    async fn find_active_push_tokens(&self) -> Result<Vec<Recipient>, DirectoryError> {
        let rows = sqlx::query("SELECT user_id, token FROM push_tokens WHERE active")
            .fetch_all(self.pool.pool())
            .await?;

        rows.iter()
            .map(|row| {
                Ok(Recipient::push(
                    row.try_get::<Uuid, _>("user_id")?,
                    row.try_get::<String, _>("token")?,
                ))
            })
            .collect()
    }

    async fn find_active_email_subscribers(&self) -> Result<Vec<Recipient>, DirectoryError> {
        let rows = sqlx::query("SELECT user_id, address FROM email_subscribers WHERE subscribed")
            .fetch_all(self.pool.pool())
            .await?;

        rows.iter()
            .map(|row| {
                Ok(Recipient::email(
                    row.try_get::<Uuid, _>("user_id")?,
                    row.try_get::<String, _>("address")?,
                ))
            })
            .collect()
    }

    async fn find_admin_push_tokens(&self) -> Result<Vec<Recipient>, DirectoryError> {
        let rows = sqlx::query(
            "SELECT p.user_id, p.token FROM push_tokens p \
             JOIN users u ON u.id = p.user_id \
             WHERE p.active AND u.is_admin",
        )
        .fetch_all(self.pool.pool())
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Recipient::push(
                    row.try_get::<Uuid, _>("user_id")?,
                    row.try_get::<String, _>("token")?,
                ))
            })
            .collect()
    }

    async fn find_recipients_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Recipient>, DirectoryError> {
        let mut recipients = Vec::new();

        let push_row = sqlx::query("SELECT token FROM push_tokens WHERE user_id = $1 AND active")
            .bind(user_id)
            .fetch_optional(self.pool.pool())
            .await?;
        if let Some(row) = push_row {
            recipients.push(Recipient::push(user_id, row.try_get::<String, _>("token")?));
        }

        let email_row =
            sqlx::query("SELECT address FROM email_subscribers WHERE user_id = $1 AND subscribed")
                .bind(user_id)
                .fetch_optional(self.pool.pool())
                .await?;
        if let Some(row) = email_row {
            recipients.push(Recipient::email(
                user_id,
                row.try_get::<String, _>("address")?,
            ));
        }

        Ok(recipients)
    }

    async fn set_push_token_active(
        &self,
        user_id: Uuid,
        active: bool,
    ) -> Result<bool, DirectoryError> {
        // The state guard makes the write idempotent: a second identical
        // call matches zero rows.
        let result = sqlx::query(
            "UPDATE push_tokens SET active = $2, updated_at = NOW() \
             WHERE user_id = $1 AND active <> $2",
        )
        .bind(user_id)
        .bind(active)
        .execute(self.pool.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_email_subscribed(
        &self,
        user_id: Uuid,
        subscribed: bool,
    ) -> Result<bool, DirectoryError> {
        let result = sqlx::query(
            "UPDATE email_subscribers SET subscribed = $2, updated_at = NOW() \
             WHERE user_id = $1 AND subscribed <> $2",
        )
        .bind(user_id)
        .bind(subscribed)
        .execute(self.pool.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn register_push_token(&self, user_id: Uuid, token: &str) -> Result<(), DirectoryError> {
        sqlx::query(
            "INSERT INTO push_tokens (user_id, token, active, updated_at) \
             VALUES ($1, $2, TRUE, NOW()) \
             ON CONFLICT (user_id) DO UPDATE \
             SET token = EXCLUDED.token, active = TRUE, updated_at = NOW()",
        )
        .bind(user_id)
        .bind(token)
        .execute(self.pool.pool())
        .await?;

        Ok(())
    }
}
