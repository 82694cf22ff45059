//! # Reminder Model
//!
//! Scheduled follow-ups for unanswered bot responses. Terminal once sent or
//! once `failed_attempts` reaches `max_retry_attempts`.
//!
//! Locking discipline (see the crate concurrency model):
//! - claiming due reminders uses `FOR UPDATE SKIP LOCKED` so concurrent sweep
//!   workers divide work instead of blocking each other;
//! - cancellation uses plain `FOR UPDATE` (wait) because skipping a locked
//!   row would silently leave a reminder alive that should be cancelled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::constants::ReminderType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Reminder {
    pub id: Uuid,
    pub client_id: String,
    pub message_id: Uuid,
    pub reminder_type: String,
    pub scheduled_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub is_cancelled: bool,
    pub failed_attempts: i32,
    pub max_retry_attempts: i32,
    pub last_failed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Reminder {
    /// Typed view of the stored cadence; corrupted rows default to 30min.
    pub fn cadence(&self) -> ReminderType {
        self.reminder_type
            .parse()
            .unwrap_or(ReminderType::Reminder30Min)
    }

    pub fn is_terminal(&self) -> bool {
        self.sent_at.is_some()
            || self.is_cancelled
            || self.failed_attempts >= self.max_retry_attempts
    }
}

/// Insert payload for a reminder
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub client_id: String,
    pub message_id: Uuid,
    pub reminder_type: ReminderType,
    pub max_retry_attempts: i32,
}

const REMINDER_COLUMNS: &str = "id, client_id, message_id, reminder_type, scheduled_at, \
     sent_at, is_cancelled, failed_attempts, max_retry_attempts, last_failed_at, created_at";

impl Reminder {
    pub async fn create(
        tx: &mut Transaction<'_, Postgres>,
        new_reminder: NewReminder,
    ) -> Result<Reminder, sqlx::Error> {
        let scheduled_at = Utc::now() + new_reminder.reminder_type.delay();
        let query = format!(
            r#"
            INSERT INTO reminders (id, client_id, message_id, reminder_type, scheduled_at,
                                   is_cancelled, failed_attempts, max_retry_attempts, created_at)
            VALUES ($1, $2, $3, $4, $5, false, 0, $6, NOW())
            RETURNING {REMINDER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Reminder>(&query)
            .bind(Uuid::new_v4())
            .bind(&new_reminder.client_id)
            .bind(new_reminder.message_id)
            .bind(new_reminder.reminder_type.as_str())
            .bind(scheduled_at)
            .bind(new_reminder.max_retry_attempts)
            .fetch_one(&mut **tx)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Reminder>, sqlx::Error> {
        let query = format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = $1");
        sqlx::query_as::<_, Reminder>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Claim due, unsent, non-cancelled reminders in scheduled order.
    ///
    /// Runs inside the sweep transaction; the skip-locked read means a second
    /// concurrent sweep claims the next rows instead of waiting, so no two
    /// workers ever process the same reminder.
    pub async fn claim_due(
        tx: &mut Transaction<'_, Postgres>,
        limit: i64,
    ) -> Result<Vec<Reminder>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {REMINDER_COLUMNS}
            FROM reminders
            WHERE scheduled_at <= NOW() AND sent_at IS NULL AND is_cancelled = false
            ORDER BY scheduled_at ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#
        );

        sqlx::query_as::<_, Reminder>(&query)
            .bind(limit)
            .fetch_all(&mut **tx)
            .await
    }

    /// Cancel pending reminders for a client. With `after_message_id`, only
    /// reminders tied to messages created strictly after the referenced
    /// message's timestamp are cancelled; responding to an older message does
    /// not cancel a reminder legitimately owed for a newer one.
    ///
    /// The read waits on row locks rather than skipping them: a reminder the
    /// sweep is currently holding must still end up cancelled or sent, never
    /// silently left pending.
    pub async fn cancel_for_client(
        tx: &mut Transaction<'_, Postgres>,
        client_id: &str,
        after_message_id: Option<Uuid>,
    ) -> Result<u64, sqlx::Error> {
        let cutoff: Option<DateTime<Utc>> = match after_message_id {
            Some(message_id) => {
                let row: Option<(DateTime<Utc>,)> =
                    sqlx::query_as("SELECT created_at FROM messages WHERE id = $1")
                        .bind(message_id)
                        .fetch_optional(&mut **tx)
                        .await?;
                match row {
                    Some((created_at,)) => Some(created_at),
                    // Unknown reference falls back to cancelling everything
                    // pending for the client
                    None => None,
                }
            }
            None => None,
        };

        let ids: Vec<(Uuid,)> = match cutoff {
            Some(cutoff) => {
                sqlx::query_as(
                    r#"
                    SELECT r.id
                    FROM reminders r
                    JOIN messages m ON m.id = r.message_id
                    WHERE r.client_id = $1 AND r.sent_at IS NULL AND r.is_cancelled = false
                      AND m.created_at > $2
                    FOR UPDATE OF r
                    "#,
                )
                .bind(client_id)
                .bind(cutoff)
                .fetch_all(&mut **tx)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT id FROM reminders
                    WHERE client_id = $1 AND sent_at IS NULL AND is_cancelled = false
                    FOR UPDATE
                    "#,
                )
                .bind(client_id)
                .fetch_all(&mut **tx)
                .await?
            }
        };

        if ids.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Uuid> = ids.into_iter().map(|(id,)| id).collect();
        let result = sqlx::query("UPDATE reminders SET is_cancelled = true WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }

    /// Cancel a single claimed reminder, used by the sweep when the client
    /// already replied.
    pub async fn cancel(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE reminders SET is_cancelled = true WHERE id = $1 AND sent_at IS NULL")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn mark_sent(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE reminders SET sent_at = NOW() WHERE id = $1 AND sent_at IS NULL",
        )
        .bind(id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a delivery failure. When attempts are exhausted or the failure
    /// is non-retryable the reminder is terminally cancelled; otherwise it
    /// stays pending for the next sweep. Returns whether the reminder is now
    /// terminal.
    pub async fn record_failure(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        retryable: bool,
    ) -> Result<bool, sqlx::Error> {
        let row: (i32, i32) = sqlx::query_as(
            r#"
            UPDATE reminders
            SET failed_attempts = failed_attempts + 1, last_failed_at = NOW()
            WHERE id = $1
            RETURNING failed_attempts, max_retry_attempts
            "#,
        )
        .bind(id)
        .fetch_one(&mut **tx)
        .await?;

        let (failed_attempts, max_retry_attempts) = row;
        let terminal = !retryable || failed_attempts >= max_retry_attempts;

        if terminal {
            sqlx::query("UPDATE reminders SET is_cancelled = true WHERE id = $1")
                .bind(id)
                .execute(&mut **tx)
                .await?;
        }

        Ok(terminal)
    }

    pub async fn pending_for_client(
        pool: &PgPool,
        client_id: &str,
    ) -> Result<Vec<Reminder>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {REMINDER_COLUMNS}
            FROM reminders
            WHERE client_id = $1 AND sent_at IS NULL AND is_cancelled = false
            ORDER BY scheduled_at ASC
            "#
        );

        sqlx::query_as::<_, Reminder>(&query)
            .bind(client_id)
            .fetch_all(pool)
            .await
    }
}
