//! # Dialog Lifecycle Manager
//!
//! Owns per-client conversation state: activity bumps, the inactivity
//! farewell, auto-close and reopen. Transition legality comes from the pure
//! state machine in [`crate::state_machine`]; this service adds persistence,
//! timing and delivery.
//!
//! Farewell dispatch is guarded against duplication three ways: the session
//! row is re-read to catch a concurrent attempt, a short look-back checks for
//! a just-sent farewell-shaped message, and the `farewell_sent_at` stamp is a
//! compare-and-set that only one caller can win.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};

use crate::config::DialogConfig;
use crate::constants::{events, MessageType, Scenario};
use crate::delivery::{DeliveryService, OperatorNotification};
use crate::error::{Result, SupportError};
use crate::gateway::TemplateRenderer;
use crate::models::{ChatSession, Message, NewMessage, SessionChannel};
use crate::orchestration::response::FAREWELL_TEXT;
use crate::state_machine::{determine_target_state, DialogEvent, DialogState};

/// Stable fragment used by the farewell look-back guard.
const FAREWELL_MARKER: &str = "anything else I can help";

/// Counters for one inactivity sweep run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub farewells_sent: usize,
    pub dialogs_closed: usize,
}

pub struct DialogLifecycle {
    pool: PgPool,
    config: DialogConfig,
    delivery: Arc<DeliveryService>,
    renderer: Arc<dyn TemplateRenderer>,
}

impl DialogLifecycle {
    pub fn new(
        pool: PgPool,
        config: DialogConfig,
        delivery: Arc<DeliveryService>,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Self {
        Self {
            pool,
            config,
            delivery,
            renderer,
        }
    }

    /// Record client activity: creates the session lazily, bumps the activity
    /// timestamp, and reopens a closed dialog with `closed_at` and
    /// `farewell_sent_at` cleared.
    #[instrument(skip(self, channel), fields(client_id = %client_id))]
    pub async fn update_activity(
        &self,
        client_id: &str,
        channel: &SessionChannel,
    ) -> Result<ChatSession> {
        let mut tx = self.pool.begin().await?;
        let before = ChatSession::get_or_create(&mut tx, client_id, channel).await?;
        let was_closed = before.state().is_closed();
        let session = ChatSession::touch_activity(&mut tx, client_id).await?;
        tx.commit().await?;

        if was_closed {
            info!(client_id = client_id, "Dialog reopened by client activity");
            self.delivery.notify_operators(OperatorNotification::new(
                events::DIALOG_REOPENED,
                client_id,
                session.id,
                "",
            ));
        }

        Ok(session)
    }

    /// One inactivity sweep: farewell phase then close phase.
    #[instrument(skip(self))]
    pub async fn process_inactive_sessions(&self) -> Result<SweepOutcome> {
        let mut outcome = SweepOutcome::default();

        let farewell_after = Duration::minutes(self.config.farewell_delay_minutes);
        for session in ChatSession::find_needing_farewell(&self.pool, farewell_after).await? {
            match self.send_farewell(&session).await {
                Ok(true) => outcome.farewells_sent += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(client_id = %session.client_id, error = %e, "Farewell attempt failed");
                }
            }
        }

        let close_after = Duration::minutes(self.config.close_timeout_minutes);
        let now = Utc::now();
        for session in ChatSession::find_inactive(&self.pool, close_after).await? {
            if !should_close(&session, now, &self.config) {
                continue;
            }
            match self.close_session(&session, DialogEvent::InactivityClose).await {
                Ok(true) => outcome.dialogs_closed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(client_id = %session.client_id, error = %e, "Auto-close failed");
                }
            }
        }

        if outcome != SweepOutcome::default() {
            info!(
                farewells_sent = outcome.farewells_sent,
                dialogs_closed = outcome.dialogs_closed,
                "Inactivity sweep finished"
            );
        }

        Ok(outcome)
    }

    /// Send the farewell for an inactive session. Returns whether this caller
    /// actually sent one.
    async fn send_farewell(&self, session: &ChatSession) -> Result<bool> {
        // Guard (a): re-read the row; a concurrent sweep or fresh activity
        // may have beaten us between the query and now
        let current = match ChatSession::find_by_client(&self.pool, &session.client_id).await? {
            Some(current) => current,
            None => return Ok(false),
        };
        let farewell_cutoff = Utc::now() - Duration::minutes(self.config.farewell_delay_minutes);
        if current.farewell_sent_at.is_some()
            || current.state().is_closed()
            || current.last_activity_at > farewell_cutoff
        {
            return Ok(false);
        }

        // Guard (b): a farewell-shaped message already on the wire
        let lookback = Utc::now() - Duration::minutes(self.config.farewell_lookback_minutes);
        if Message::find_recent_bot_auto_containing(
            &self.pool,
            &session.client_id,
            FAREWELL_MARKER,
            lookback,
        )
        .await?
        .is_some()
        {
            ChatSession::mark_farewell_sent(&self.pool, &session.client_id).await?;
            return Ok(false);
        }

        // Guard (c): the stamp itself; only one caller wins
        if !ChatSession::mark_farewell_sent(&self.pool, &session.client_id).await? {
            return Ok(false);
        }

        if self.config.farewell_send_delay_seconds > 0 {
            tokio::time::sleep(StdDuration::from_secs(self.config.farewell_send_delay_seconds))
                .await;
        }

        let text = self
            .renderer
            .render(Scenario::Farewell, &HashMap::new())
            .await
            .unwrap_or_else(|| FAREWELL_TEXT.to_string());

        let mut tx = self.pool.begin().await?;
        let farewell = Message::create(
            &mut tx,
            NewMessage {
                client_id: session.client_id.clone(),
                content: text,
                message_type: MessageType::BotAuto,
                is_first_message: false,
            },
        )
        .await?;
        tx.commit().await?;

        let receipt = self
            .delivery
            .send(&farewell, &current.channel(), Some(Scenario::Farewell))
            .await;
        if !receipt.success {
            warn!(
                client_id = %session.client_id,
                error = receipt.error.as_deref().unwrap_or("unknown"),
                "Farewell delivery failed"
            );
        }

        self.delivery.notify_operators(OperatorNotification::new(
            events::DIALOG_FAREWELL_SENT,
            &session.client_id,
            farewell.id,
            &farewell.content,
        ));

        debug!(client_id = %session.client_id, "Farewell sent");
        Ok(true)
    }

    /// Manual close; idempotent when already closed.
    #[instrument(skip(self), fields(client_id = %client_id))]
    pub async fn close_dialog(&self, client_id: &str) -> Result<bool> {
        let session = ChatSession::find_by_client(&self.pool, client_id)
            .await?
            .ok_or_else(|| {
                SupportError::ValidationError(format!("no session for client {client_id}"))
            })?;
        self.close_session(&session, DialogEvent::Close).await
    }

    /// Manual reopen; idempotent when already open.
    #[instrument(skip(self), fields(client_id = %client_id))]
    pub async fn reopen_dialog(&self, client_id: &str) -> Result<ChatSession> {
        self.update_activity(client_id, &SessionChannel::default())
            .await
    }

    async fn close_session(&self, session: &ChatSession, event: DialogEvent) -> Result<bool> {
        let target = determine_target_state(session.state(), &event)
            .map_err(|e| SupportError::StateTransitionError(e.to_string()))?;
        if target != DialogState::Closed || session.state().is_closed() {
            return Ok(false);
        }

        let closed = ChatSession::close(&self.pool, &session.client_id).await?;
        if closed {
            info!(client_id = %session.client_id, event = %event, "Dialog closed");
            self.delivery.notify_operators(OperatorNotification::new(
                events::DIALOG_CLOSED,
                &session.client_id,
                session.id,
                "",
            ));
        }
        Ok(closed)
    }
}

/// Close decision for an inactive session.
///
/// A session whose farewell went out must have had it standing for at least
/// `close_timeout - farewell_delay` before closing, so the client always gets
/// the full window to respond to the farewell itself. A session that somehow
/// reached the close threshold without a farewell closes directly.
pub fn should_close(session: &ChatSession, now: DateTime<Utc>, config: &DialogConfig) -> bool {
    let close_after = Duration::minutes(config.close_timeout_minutes);
    if session.last_activity_at > now - close_after {
        return false;
    }
    match session.farewell_sent_at {
        Some(farewell_at) => {
            let standing =
                Duration::minutes(config.close_timeout_minutes - config.farewell_delay_minutes);
            farewell_at <= now - standing
        }
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn session(
        last_activity_minutes_ago: i64,
        farewell_minutes_ago: Option<i64>,
    ) -> ChatSession {
        let now = Utc::now();
        ChatSession {
            id: Uuid::new_v4(),
            client_id: "client-1".to_string(),
            status: "open".to_string(),
            last_activity_at: now - Duration::minutes(last_activity_minutes_ago),
            closed_at: None,
            farewell_sent_at: farewell_minutes_ago.map(|m| now - Duration::minutes(m)),
            webhook_url: None,
            platform: None,
            chat_id: None,
        }
    }

    #[test]
    fn test_active_session_never_closes() {
        let config = DialogConfig::default();
        assert!(!should_close(&session(1, None), Utc::now(), &config));
    }

    #[test]
    fn test_inactive_session_without_farewell_closes() {
        let config = DialogConfig::default();
        assert!(should_close(&session(10, None), Utc::now(), &config));
    }

    #[test]
    fn test_fresh_farewell_defers_close() {
        // Farewell sent moments ago; the client still has its response window
        let config = DialogConfig::default();
        assert!(!should_close(&session(10, Some(0)), Utc::now(), &config));
    }

    #[test]
    fn test_stood_farewell_allows_close() {
        let config = DialogConfig::default();
        assert!(should_close(&session(10, Some(5)), Utc::now(), &config));
    }
}
