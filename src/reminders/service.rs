//! # Reminder Service
//!
//! The public contract over reminder rows: create the follow-up trio for an
//! answered message, cancel pending follow-ups (optionally scoped to
//! messages newer than a reference), and the claim/mark/fail operations the
//! sweep worker drives. Each call is one transaction.

use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::ReminderConfig;
use crate::constants::ReminderType;
use crate::error::Result;
use crate::models::{NewReminder, Reminder};

pub struct ReminderService {
    pool: PgPool,
    config: ReminderConfig,
}

impl ReminderService {
    pub fn new(pool: PgPool, config: ReminderConfig) -> Self {
        Self { pool, config }
    }

    /// Schedule one follow-up.
    pub async fn create(
        &self,
        client_id: &str,
        message_id: Uuid,
        reminder_type: ReminderType,
    ) -> Result<Reminder> {
        let mut tx = self.pool.begin().await?;
        let reminder = Reminder::create(
            &mut tx,
            NewReminder {
                client_id: client_id.to_string(),
                message_id,
                reminder_type,
                max_retry_attempts: self.config.max_retry_attempts,
            },
        )
        .await?;
        tx.commit().await?;
        Ok(reminder)
    }

    /// Schedule the full 15min/30min/1day trio for an answered message.
    #[instrument(skip(self), fields(client_id = %client_id, message_id = %message_id))]
    pub async fn create_followups(
        &self,
        client_id: &str,
        message_id: Uuid,
    ) -> Result<Vec<Reminder>> {
        let mut tx = self.pool.begin().await?;
        let mut reminders = Vec::with_capacity(3);
        for reminder_type in [
            ReminderType::Reminder15Min,
            ReminderType::Reminder30Min,
            ReminderType::Reminder1Day,
        ] {
            reminders.push(
                Reminder::create(
                    &mut tx,
                    NewReminder {
                        client_id: client_id.to_string(),
                        message_id,
                        reminder_type,
                        max_retry_attempts: self.config.max_retry_attempts,
                    },
                )
                .await?,
            );
        }
        tx.commit().await?;
        Ok(reminders)
    }

    /// Cancel pending reminders for a client. With `after_message_id` only
    /// reminders tied to messages created strictly after the referenced
    /// message are cancelled. Returns the cancelled count.
    #[instrument(skip(self), fields(client_id = %client_id))]
    pub async fn cancel(
        &self,
        client_id: &str,
        after_message_id: Option<Uuid>,
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let cancelled = Reminder::cancel_for_client(&mut tx, client_id, after_message_id).await?;
        tx.commit().await?;
        if cancelled > 0 {
            debug!(client_id = client_id, cancelled = cancelled, "Reminders cancelled");
        }
        Ok(cancelled)
    }

    pub async fn pending(&self, client_id: &str) -> Result<Vec<Reminder>> {
        Ok(Reminder::pending_for_client(&self.pool, client_id).await?)
    }

    pub async fn mark_sent(&self, id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let updated = Reminder::mark_sent(&mut tx, id).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Record a delivery failure; returns whether the reminder is terminal.
    pub async fn record_failure(&self, id: Uuid, retryable: bool) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let terminal = Reminder::record_failure(&mut tx, id, retryable).await?;
        tx.commit().await?;
        Ok(terminal)
    }
}
