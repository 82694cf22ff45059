//! # Reminder Sweep Worker
//!
//! Periodic loop claiming due reminders and dispatching REMINDER responses.
//! The claim runs with skip-locked reads, so overlapping sweeps (or a second
//! process) divide the due set instead of double-sending.
//!
//! Per claimed reminder: if the client has written anything since the
//! reminder was created, the follow-up is moot and gets cancelled; otherwise
//! the reminder text is rendered, persisted as a BOT_AUTO message and
//! delivered. Failures feed the retry budget; exhausting it (or a
//! non-retryable failure) terminally cancels the reminder.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::config::ReminderConfig;
use crate::constants::{events, MessageType, Scenario};
use crate::delivery::{DeliveryService, OperatorNotification};
use crate::error::Result;
use crate::gateway::TemplateRenderer;
use crate::models::{ChatSession, Message, NewMessage, Reminder};

/// Default reminder text when no template is configured.
const REMINDER_TEXT: &str =
    "Just checking in! Did my last reply help, or is there anything else you need?";

/// Counters for one sweep run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReminderSweepOutcome {
    pub sent: usize,
    pub cancelled: usize,
    pub failed: usize,
}

pub struct ReminderWorker {
    pool: PgPool,
    config: ReminderConfig,
    delivery: Arc<DeliveryService>,
    renderer: Arc<dyn TemplateRenderer>,
}

impl ReminderWorker {
    pub fn new(
        pool: PgPool,
        config: ReminderConfig,
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

    /// Run the sweep loop until the shutdown token flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(Duration::from_secs(
            self.config.sweep_interval_seconds,
        ));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            interval_seconds = self.config.sweep_interval_seconds,
            "Reminder worker started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        warn!(error = %e, "Reminder sweep failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Reminder worker shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// One sweep: claim and process due reminders, one transaction each.
    ///
    /// Claiming in batches of one keeps the claim lock scoped to the reminder
    /// being worked on: a `mark_sent` commits immediately after its webhook
    /// delivery, so a later database error cannot roll back the record of a
    /// send that already happened, and cancellation paths waiting on the row
    /// never queue behind a whole batch of outbound sends.
    #[instrument(skip(self))]
    pub async fn sweep_once(&self) -> Result<ReminderSweepOutcome> {
        let mut outcome = ReminderSweepOutcome::default();

        for _ in 0..self.config.claim_batch_size {
            let mut tx = self.pool.begin().await?;
            let Some(reminder) = Reminder::claim_due(&mut tx, 1).await?.into_iter().next()
            else {
                tx.commit().await?;
                break;
            };

            debug!(reminder_id = %reminder.id, "Claimed due reminder");
            self.process_claimed(&mut tx, &reminder, &mut outcome).await?;
            tx.commit().await?;
        }

        if outcome != ReminderSweepOutcome::default() {
            info!(
                sent = outcome.sent,
                cancelled = outcome.cancelled,
                failed = outcome.failed,
                "Reminder sweep finished"
            );
        }

        Ok(outcome)
    }

    /// Decide and record the disposition of one claimed reminder.
    async fn process_claimed(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        reminder: &Reminder,
        outcome: &mut ReminderSweepOutcome,
    ) -> Result<()> {
        // The client replying since creation makes the follow-up moot
        let replied =
            Message::find_user_message_after(&self.pool, &reminder.client_id, reminder.created_at)
                .await?
                .is_some();
        if replied {
            Reminder::cancel(tx, reminder.id).await?;
            outcome.cancelled += 1;
            return Ok(());
        }

        let channel = ChatSession::find_by_client(&self.pool, &reminder.client_id)
            .await?
            .map(|s| s.channel())
            .unwrap_or_default();

        let text = self
            .renderer
            .render(Scenario::Reminder, &HashMap::new())
            .await
            .unwrap_or_else(|| REMINDER_TEXT.to_string());

        let message = Message::create(
            tx,
            NewMessage {
                client_id: reminder.client_id.clone(),
                content: text,
                message_type: MessageType::BotAuto,
                is_first_message: false,
            },
        )
        .await?;

        let receipt = self
            .delivery
            .send(&message, &channel, Some(Scenario::Reminder))
            .await;

        if receipt.success {
            Reminder::mark_sent(tx, reminder.id).await?;
            outcome.sent += 1;
            self.delivery.notify_operators(OperatorNotification::new(
                events::REMINDER_SENT,
                &reminder.client_id,
                message.id,
                &message.content,
            ));
        } else {
            let terminal = Reminder::record_failure(tx, reminder.id, receipt.retryable).await?;
            outcome.failed += 1;
            warn!(
                reminder_id = %reminder.id,
                client_id = %reminder.client_id,
                terminal = terminal,
                error = receipt.error.as_deref().unwrap_or("unknown"),
                "Reminder delivery failed"
            );
            if terminal {
                self.delivery.notify_operators(OperatorNotification::new(
                    events::REMINDER_FAILED,
                    &reminder.client_id,
                    reminder.message_id,
                    "",
                ));
            }
        }

        Ok(())
    }
}
