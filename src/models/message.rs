//! # Message Model
//!
//! The per-client timeline: every inbound USER message and every bot/operator
//! reply is one immutable row, except for `priority`, `escalation_reason` and
//! `is_processed` which are set exactly once during orchestration.
//!
//! The intake-critical queries here are lock-aware: first-message
//! determination reads the client's rows under `FOR UPDATE` inside the
//! intake transaction, serializing concurrent writers for one client while
//! leaving other clients fully parallel.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::constants::{EscalationReason, MessageType, PriorityLevel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub client_id: String,
    pub content: String,
    pub message_type: String,
    pub priority: String,
    pub escalation_reason: Option<String>,
    pub is_first_message: bool,
    pub is_processed: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Typed view of the stored message type; corrupted rows default to USER.
    pub fn kind(&self) -> MessageType {
        self.message_type.parse().unwrap_or(MessageType::User)
    }

    /// Typed view of the stored priority; corrupted rows default to LOW.
    pub fn priority_level(&self) -> PriorityLevel {
        PriorityLevel::parse_lenient(&self.priority)
    }

    pub fn escalation_reason_typed(&self) -> Option<EscalationReason> {
        self.escalation_reason
            .as_deref()
            .and_then(|r| r.parse().ok())
    }
}

/// Insert payload for a new message row
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub client_id: String,
    pub content: String,
    pub message_type: MessageType,
    pub is_first_message: bool,
}

const MESSAGE_COLUMNS: &str = "id, client_id, content, message_type, priority, \
     escalation_reason, is_first_message, is_processed, created_at";

impl Message {
    /// Insert a message inside the intake transaction.
    pub async fn create(
        tx: &mut Transaction<'_, Postgres>,
        new_message: NewMessage,
    ) -> Result<Message, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO messages (id, client_id, content, message_type, priority,
                                  is_first_message, is_processed, created_at)
            VALUES ($1, $2, $3, $4, 'low', $5, false, NOW())
            RETURNING {MESSAGE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Message>(&query)
            .bind(Uuid::new_v4())
            .bind(&new_message.client_id)
            .bind(&new_message.content)
            .bind(new_message.message_type.as_str())
            .bind(new_message.is_first_message)
            .fetch_one(&mut **tx)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Message>, sqlx::Error> {
        let query = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1");
        sqlx::query_as::<_, Message>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Most recent byte-identical submission from the same client inside the
    /// dedup window, if any.
    ///
    /// Generic over the executor: intake runs it once as a cheap pre-check on
    /// the pool and once more inside the serialized transaction, where the
    /// per-client lock guarantees the answer is authoritative.
    pub async fn find_recent_duplicate<'e, E>(
        executor: E,
        client_id: &str,
        content: &str,
        window: Duration,
    ) -> Result<Option<Message>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let cutoff = Utc::now() - window;
        let query = format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE client_id = $1 AND content = $2 AND created_at >= $3
              AND message_type = 'user'
            ORDER BY created_at DESC
            LIMIT 1
            "#
        );

        sqlx::query_as::<_, Message>(&query)
            .bind(client_id)
            .bind(content)
            .bind(cutoff)
            .fetch_optional(executor)
            .await
    }

    /// First bot reply at or after the given timestamp, used to answer a
    /// duplicate submission with the original outcome.
    pub async fn find_bot_reply_since(
        pool: &PgPool,
        client_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Message>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE client_id = $1
              AND message_type IN ('bot_auto', 'bot_escalated')
              AND created_at >= $2
            ORDER BY created_at ASC
            LIMIT 1
            "#
        );

        sqlx::query_as::<_, Message>(&query)
            .bind(client_id)
            .bind(since)
            .fetch_optional(pool)
            .await
    }

    /// Count the client's existing rows under an exclusive row lock.
    ///
    /// Must run inside the intake transaction, after the per-client advisory
    /// lock is held: the advisory lock serializes the zero-rows case where
    /// there is nothing yet to row-lock.
    pub async fn locked_count_for_client(
        tx: &mut Transaction<'_, Postgres>,
        client_id: &str,
    ) -> Result<i64, sqlx::Error> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT id FROM messages WHERE client_id = $1 FOR UPDATE")
                .bind(client_id)
                .fetch_all(&mut **tx)
                .await?;
        Ok(rows.len() as i64)
    }

    /// Messages from the client inside the trailing window (rate limiting and
    /// the frustrated-repeat-contact escalation rule).
    pub async fn count_user_messages_since(
        pool: &PgPool,
        client_id: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE client_id = $1 AND message_type = 'user' AND created_at >= $2
            "#,
        )
        .bind(client_id)
        .bind(since)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Recent USER messages from other clients, newest first, for the
    /// mass-event scan.
    pub async fn recent_user_messages_excluding(
        pool: &PgPool,
        excluding_client_id: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Message>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE created_at >= $1 AND message_type = 'user' AND client_id != $2
            ORDER BY created_at DESC
            LIMIT $3
            "#
        );

        sqlx::query_as::<_, Message>(&query)
            .bind(since)
            .bind(excluding_client_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Whether any escalated bot reply went to this client since the cutoff.
    pub async fn has_escalated_reply_since(
        pool: &PgPool,
        client_id: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let row: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM messages
                WHERE client_id = $1 AND message_type = 'bot_escalated' AND created_at >= $2
            )
            "#,
        )
        .bind(client_id)
        .bind(since)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Latest USER message created strictly after the cutoff, used by the
    /// reminder worker to detect that the client already replied.
    pub async fn find_user_message_after(
        pool: &PgPool,
        client_id: &str,
        after: DateTime<Utc>,
    ) -> Result<Option<Message>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE client_id = $1 AND message_type = 'user' AND created_at > $2
            ORDER BY created_at DESC
            LIMIT 1
            "#
        );

        sqlx::query_as::<_, Message>(&query)
            .bind(client_id)
            .bind(after)
            .fetch_optional(pool)
            .await
    }

    /// Recent bot_auto message matching a content marker, the duplicate guard
    /// for concurrent farewell attempts.
    pub async fn find_recent_bot_auto_containing(
        pool: &PgPool,
        client_id: &str,
        needle: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Message>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE client_id = $1 AND message_type = 'bot_auto'
              AND created_at >= $2 AND content ILIKE '%' || $3 || '%'
            ORDER BY created_at DESC
            LIMIT 1
            "#
        );

        sqlx::query_as::<_, Message>(&query)
            .bind(client_id)
            .bind(since)
            .bind(needle)
            .fetch_optional(pool)
            .await
    }

    /// Stamp priority and escalation reason, set exactly once per row during
    /// orchestration.
    pub async fn set_escalation(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        priority: PriorityLevel,
        escalation_reason: Option<EscalationReason>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE messages SET priority = $2, escalation_reason = $3 WHERE id = $1")
            .bind(id)
            .bind(priority.as_str())
            .bind(escalation_reason.map(|r| r.as_str()))
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn mark_processed(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE messages SET is_processed = true WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}
