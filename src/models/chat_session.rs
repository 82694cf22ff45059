//! # Chat Session Model
//!
//! One row per client, created lazily on first activity. Carries the dialog
//! lifecycle state, activity timestamps, and the cached delivery coordinates
//! (webhook url / platform / chat id) that farewell and reminder sends reuse
//! when the client is no longer on the wire.
//!
//! Mutated by the dialog lifecycle service only.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::state_machine::DialogState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ChatSession {
    pub id: Uuid,
    pub client_id: String,
    pub status: String,
    pub last_activity_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub farewell_sent_at: Option<DateTime<Utc>>,
    pub webhook_url: Option<String>,
    pub platform: Option<String>,
    pub chat_id: Option<String>,
}

/// Delivery coordinates cached on a session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionChannel {
    pub webhook_url: Option<String>,
    pub platform: Option<String>,
    pub chat_id: Option<String>,
}

impl ChatSession {
    /// Typed view of the stored status; corrupted rows default to OPEN.
    pub fn state(&self) -> DialogState {
        self.status.parse().unwrap_or(DialogState::Open)
    }

    pub fn channel(&self) -> SessionChannel {
        SessionChannel {
            webhook_url: self.webhook_url.clone(),
            platform: self.platform.clone(),
            chat_id: self.chat_id.clone(),
        }
    }
}

const SESSION_COLUMNS: &str = "id, client_id, status, last_activity_at, closed_at, \
     farewell_sent_at, webhook_url, platform, chat_id";

impl ChatSession {
    /// Get or create the session row, refreshing cached channel coordinates
    /// when new ones are provided. The upsert keeps concurrent first-activity
    /// races safe without a separate existence check.
    pub async fn get_or_create(
        tx: &mut Transaction<'_, Postgres>,
        client_id: &str,
        channel: &SessionChannel,
    ) -> Result<ChatSession, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO chat_sessions (id, client_id, status, last_activity_at,
                                       webhook_url, platform, chat_id)
            VALUES ($1, $2, 'open', NOW(), $3, $4, $5)
            ON CONFLICT (client_id) DO UPDATE SET
                webhook_url = COALESCE(EXCLUDED.webhook_url, chat_sessions.webhook_url),
                platform = COALESCE(EXCLUDED.platform, chat_sessions.platform),
                chat_id = COALESCE(EXCLUDED.chat_id, chat_sessions.chat_id)
            RETURNING {SESSION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, ChatSession>(&query)
            .bind(Uuid::new_v4())
            .bind(client_id)
            .bind(&channel.webhook_url)
            .bind(&channel.platform)
            .bind(&channel.chat_id)
            .fetch_one(&mut **tx)
            .await
    }

    pub async fn find_by_client(
        pool: &PgPool,
        client_id: &str,
    ) -> Result<Option<ChatSession>, sqlx::Error> {
        let query = format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE client_id = $1");
        sqlx::query_as::<_, ChatSession>(&query)
            .bind(client_id)
            .fetch_optional(pool)
            .await
    }

    /// Bump activity and reopen if closed, clearing `closed_at` and
    /// `farewell_sent_at`. Returns the refreshed row.
    pub async fn touch_activity(
        tx: &mut Transaction<'_, Postgres>,
        client_id: &str,
    ) -> Result<ChatSession, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE chat_sessions
            SET status = 'open',
                last_activity_at = NOW(),
                closed_at = NULL,
                farewell_sent_at = NULL
            WHERE client_id = $1
            RETURNING {SESSION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, ChatSession>(&query)
            .bind(client_id)
            .fetch_one(&mut **tx)
            .await
    }

    /// Open sessions inactive for at least `inactive_for` that have not yet
    /// been sent a farewell.
    pub async fn find_needing_farewell(
        pool: &PgPool,
        inactive_for: Duration,
    ) -> Result<Vec<ChatSession>, sqlx::Error> {
        let cutoff = Utc::now() - inactive_for;
        let query = format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM chat_sessions
            WHERE status IN ('open', 'escalated')
              AND last_activity_at <= $1
              AND farewell_sent_at IS NULL
            "#
        );

        sqlx::query_as::<_, ChatSession>(&query)
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }

    /// Open sessions inactive for at least `inactive_for`, farewell state
    /// notwithstanding; the close decision applies its own farewell-age rule.
    pub async fn find_inactive(
        pool: &PgPool,
        inactive_for: Duration,
    ) -> Result<Vec<ChatSession>, sqlx::Error> {
        let cutoff = Utc::now() - inactive_for;
        let query = format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM chat_sessions
            WHERE status IN ('open', 'escalated')
              AND last_activity_at <= $1
            "#
        );

        sqlx::query_as::<_, ChatSession>(&query)
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }

    /// Set `farewell_sent_at` only if it is still unset; returns whether this
    /// caller won the race.
    pub async fn mark_farewell_sent(pool: &PgPool, client_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE chat_sessions
            SET farewell_sent_at = NOW()
            WHERE client_id = $1 AND farewell_sent_at IS NULL
            "#,
        )
        .bind(client_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Transition to CLOSED; idempotent for already-closed sessions.
    pub async fn close(pool: &PgPool, client_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE chat_sessions
            SET status = 'closed', closed_at = NOW()
            WHERE client_id = $1 AND status != 'closed'
            "#,
        )
        .bind(client_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark an open session escalated; informational, never blocks activity.
    pub async fn mark_escalated(
        tx: &mut Transaction<'_, Postgres>,
        client_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE chat_sessions SET status = 'escalated' WHERE client_id = $1 AND status = 'open'",
        )
        .bind(client_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
