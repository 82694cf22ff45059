//! # Message Intake
//!
//! ## Architecture: Serialized Per-Client Intake
//!
//! Intake is the only stage that must be strictly serialized per client:
//! first-message determination and the dedup check race with concurrent
//! submissions from the same client, and "first" must be true for exactly one
//! message ever.
//!
//! The critical section is one transaction holding
//! `pg_advisory_xact_lock(hashtext(client_id))` plus `FOR UPDATE` over the
//! client's existing rows. Row locks alone cannot serialize a brand-new
//! client (there are no rows to lock yet); the advisory lock covers that
//! case. Both release automatically on commit or rollback. Different clients
//! never contend.
//!
//! Dialog activity is bumped inside the same unit of work, so a message and
//! its session side effect commit or roll back together.

use chrono::{Duration, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument, warn};

use crate::config::IntakeConfig;
use crate::constants::MessageType;
use crate::error::{Result, SupportError};
use crate::models::{ChatSession, Message, NewMessage, SessionChannel};
use crate::orchestration::types::IngestOutcome;

pub struct MessageIntake {
    pool: PgPool,
    config: IntakeConfig,
}

impl MessageIntake {
    pub fn new(pool: PgPool, config: IntakeConfig) -> Self {
        Self { pool, config }
    }

    /// Ingest one inbound client message.
    ///
    /// Dedup and rate-limit checks run before the serialized section as cheap
    /// rejections, and the dedup lookup runs again inside the transaction once
    /// the per-client lock is held. A retried duplicate arriving concurrently
    /// lands behind the original's lock and sees its committed row there.
    #[instrument(skip(self, content, channel), fields(client_id = %client_id))]
    pub async fn ingest(
        &self,
        client_id: &str,
        content: &str,
        channel: &SessionChannel,
    ) -> Result<IngestOutcome> {
        if self.config.rate_limit_enabled && !self.check_rate_limit(client_id).await? {
            warn!(client_id = client_id, "Rate limit exceeded");
            return Ok(IngestOutcome::RateLimited);
        }

        if let Some(original) = self.check_duplicate(client_id, content).await? {
            debug!(
                client_id = client_id,
                original_id = %original.id,
                "Duplicate submission inside dedup window"
            );
            return Ok(IngestOutcome::Duplicate { original });
        }

        let mut tx = self.pool.begin().await?;

        Self::acquire_client_lock(&mut tx, client_id).await?;

        // Authoritative dedup check: a concurrent submission of the same
        // content may have committed while this one waited on the lock.
        let window = Duration::seconds(self.config.dedup_window_seconds);
        if let Some(original) =
            Message::find_recent_duplicate(&mut *tx, client_id, content, window).await?
        {
            debug!(
                client_id = client_id,
                original_id = %original.id,
                "Duplicate detected under client lock"
            );
            return Ok(IngestOutcome::Duplicate { original });
        }

        let existing = Message::locked_count_for_client(&mut tx, client_id).await?;
        let is_first_message = existing == 0;

        let message = Message::create(
            &mut tx,
            NewMessage {
                client_id: client_id.to_string(),
                content: content.to_string(),
                message_type: MessageType::User,
                is_first_message,
            },
        )
        .await?;

        // Session activity is part of the same unit of work
        ChatSession::get_or_create(&mut tx, client_id, channel).await?;
        ChatSession::touch_activity(&mut tx, client_id).await?;

        tx.commit().await?;

        debug!(
            client_id = client_id,
            message_id = %message.id,
            is_first_message = is_first_message,
            "Accepted inbound message"
        );

        Ok(IngestOutcome::Accepted {
            message,
            is_first_message,
        })
    }

    /// Per-client mutual-exclusion token, held until the transaction ends.
    async fn acquire_client_lock(
        tx: &mut Transaction<'_, Postgres>,
        client_id: &str,
    ) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(client_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                SupportError::DatabaseError(format!("Failed to acquire client intake lock: {e}"))
            })?;
        Ok(())
    }

    /// A prior byte-identical USER message inside the trailing dedup window.
    pub async fn check_duplicate(
        &self,
        client_id: &str,
        content: &str,
    ) -> Result<Option<Message>> {
        let window = Duration::seconds(self.config.dedup_window_seconds);
        Ok(Message::find_recent_duplicate(&self.pool, client_id, content, window).await?)
    }

    /// True when the client is still within its per-minute message budget.
    pub async fn check_rate_limit(&self, client_id: &str) -> Result<bool> {
        let since = Utc::now() - Duration::minutes(1);
        let count = Message::count_user_messages_since(&self.pool, client_id, since).await?;
        Ok(count < self.config.rate_limit_per_minute)
    }
}
