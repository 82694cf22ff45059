//! # Message Orchestrator
//!
//! Top-level coordinator for one inbound message: dedup → classify →
//! escalate → persist → respond → finalize. The synchronous caller always
//! gets a terminal [`OrchestrationResult`]; delivery and operator fan-out
//! happen asynchronously after the finalize transaction commits and never
//! invalidate the committed record.

use std::sync::Arc;

use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};

use crate::config::SupportConfig;
use crate::constants::{events, EscalationReason, PriorityLevel, ReminderType, Scenario};
use crate::delivery::{DeliveryService, OperatorNotification};
use crate::error::{Result, SupportError};
use crate::gateway::{BoundedClassifier, ClassificationGateway, TemplateRenderer};
use crate::models::{
    ChatSession, Classification, Message, NewClassification, NewMessage, NewReminder, Reminder,
    SessionChannel,
};
use crate::orchestration::escalation::EscalationEngine;
use crate::orchestration::intake::MessageIntake;
use crate::orchestration::mass_event::MassEventDetector;
use crate::orchestration::response::ResponseBuilder;
use crate::orchestration::text;
use crate::orchestration::types::{
    IngestOutcome, OrchestrationResult, OrchestrationStatus, ProcessedMessage,
};

const MASS_EVENT_MODEL: &str = "mass_event_detector";

pub struct MessageOrchestrator {
    pool: PgPool,
    config: SupportConfig,
    intake: MessageIntake,
    mass_detector: MassEventDetector,
    escalation: EscalationEngine,
    classifier: BoundedClassifier,
    responses: ResponseBuilder,
    delivery: Arc<DeliveryService>,
}

impl MessageOrchestrator {
    pub fn new(
        pool: PgPool,
        config: SupportConfig,
        gateway: Arc<dyn ClassificationGateway>,
        renderer: Arc<dyn TemplateRenderer>,
        delivery: Arc<DeliveryService>,
    ) -> Self {
        Self {
            intake: MessageIntake::new(pool.clone(), config.intake.clone()),
            mass_detector: MassEventDetector::new(pool.clone(), config.mass_event.clone()),
            escalation: EscalationEngine::new(pool.clone(), config.escalation.clone()),
            classifier: BoundedClassifier::new(gateway, config.classification.clone()),
            responses: ResponseBuilder::new(renderer),
            delivery,
            pool,
            config,
        }
    }

    /// Process one inbound client message end to end.
    #[instrument(skip(self, content, channel), fields(client_id = %client_id))]
    pub async fn process_message(
        &self,
        client_id: &str,
        content: &str,
        channel: &SessionChannel,
    ) -> Result<OrchestrationResult> {
        let (message, is_first_message) = match self.intake.ingest(client_id, content, channel).await? {
            IngestOutcome::Accepted {
                message,
                is_first_message,
            } => (message, is_first_message),
            IngestOutcome::Duplicate { original } => {
                return self.duplicate_result(client_id, original).await;
            }
            IngestOutcome::RateLimited => {
                return Err(SupportError::ValidationError(format!(
                    "rate limit exceeded for client {client_id}"
                )));
            }
        };

        let normalized = text::normalize(content);
        if text::is_noise(&normalized) {
            debug!(message_id = %message.id, "Input is noise, sending fallback");
            let processed = Self::fallback_processed(
                message,
                is_first_message,
                normalized,
                EscalationReason::UnknownScenario,
                PriorityLevel::High,
            );
            return self
                .finalize(processed, OrchestrationStatus::Fallback, channel)
                .await;
        }

        let processed = self
            .classify_and_decide(message, is_first_message, normalized, content)
            .await?;

        let status = if processed.classification.is_none() {
            OrchestrationStatus::Fallback
        } else if processed.requires_escalation {
            OrchestrationStatus::Escalated
        } else {
            OrchestrationStatus::Success
        };

        self.finalize(processed, status, channel).await
    }

    /// Classification stage: the mass-event override runs first and skips the
    /// gateway entirely during an incident.
    async fn classify_and_decide(
        &self,
        message: Message,
        is_first_message: bool,
        normalized: String,
        raw_content: &str,
    ) -> Result<ProcessedMessage> {
        let report = self
            .mass_detector
            .detect(&normalized, &message.client_id)
            .await?;

        if report.is_mass_event {
            let confidence = self.mass_detector.override_confidence();
            let classification = self
                .save_classification(
                    &message,
                    Scenario::MassOutage,
                    confidence,
                    MASS_EVENT_MODEL.to_string(),
                    Some(format!(
                        "{} similar messages in window, avg similarity {:.2}",
                        report.similar_count, report.avg_similarity
                    )),
                )
                .await?;

            // Incident traffic is answered automatically, not fanned out to
            // operators one message at a time
            return Ok(ProcessedMessage {
                message,
                classification: Some(classification),
                scenario: Scenario::MassOutage,
                confidence,
                requires_escalation: false,
                priority: PriorityLevel::Low,
                escalation_reason: None,
                priority_queue: PriorityLevel::Low.priority_queue(),
                is_first_message,
                processed_text: normalized,
            });
        }

        let bounded = match self
            .classifier
            .classify(&normalized, &message.client_id)
            .await
        {
            Some(bounded) => bounded,
            None => {
                warn!(message_id = %message.id, "Classification unavailable, degrading to fallback");
                return Ok(Self::fallback_processed(
                    message,
                    is_first_message,
                    normalized,
                    EscalationReason::SystemError,
                    PriorityLevel::Medium,
                ));
            }
        };

        let classification = self
            .save_classification(
                &message,
                bounded.scenario,
                bounded.confidence,
                bounded.model,
                bounded.reasoning,
            )
            .await?;

        let mut decision = self
            .escalation
            .evaluate(
                message.id,
                bounded.scenario,
                bounded.confidence,
                &message.client_id,
                raw_content,
            )
            .await?;

        // Scenario layer on top of the rule engine
        let scenario_escalates = bounded.scenario.is_always_escalated()
            || (bounded.scenario == Scenario::Referral && text::contains_digits(&normalized));
        if scenario_escalates {
            decision.should_escalate = true;
            if bounded.scenario == Scenario::Complaint
                && !decision.reasons.contains(&EscalationReason::Complaint)
            {
                decision.reasons.push(EscalationReason::Complaint);
            }
            decision.level = decision.level.max(PriorityLevel::Medium);
            decision.priority_queue = decision.level.priority_queue();
        }

        Ok(ProcessedMessage {
            message,
            classification: Some(classification),
            scenario: bounded.scenario,
            confidence: bounded.confidence,
            requires_escalation: decision.should_escalate,
            priority: decision.level,
            escalation_reason: decision.reasons.first().copied(),
            priority_queue: decision.priority_queue,
            is_first_message,
            processed_text: normalized,
        })
    }

    /// Persist the outcome, draft and persist the single reply, manage the
    /// reminder trio, then schedule delivery and operator fan-out.
    async fn finalize(
        &self,
        processed: ProcessedMessage,
        status: OrchestrationStatus,
        channel: &SessionChannel,
    ) -> Result<OrchestrationResult> {
        let draft = if processed.classification.is_none() {
            self.responses.fallback_draft()
        } else {
            self.responses
                .draft(
                    processed.scenario,
                    processed.requires_escalation,
                    processed.is_first_message,
                    &processed.processed_text,
                    &processed.message.client_id,
                )
                .await
        };

        let mut tx = self.pool.begin().await?;

        Message::set_escalation(
            &mut tx,
            processed.message.id,
            processed.priority,
            processed.escalation_reason,
        )
        .await?;
        Message::mark_processed(&mut tx, processed.message.id).await?;

        let response = Message::create(
            &mut tx,
            NewMessage {
                client_id: processed.message.client_id.clone(),
                content: draft.text.clone(),
                message_type: draft.message_type,
                is_first_message: false,
            },
        )
        .await?;

        // The client just wrote to us; every outstanding follow-up is moot
        let cancelled =
            Reminder::cancel_for_client(&mut tx, &processed.message.client_id, None).await?;
        if cancelled > 0 {
            debug!(
                client_id = %processed.message.client_id,
                cancelled = cancelled,
                "Cancelled pending reminders"
            );
        }

        if !processed.requires_escalation && !processed.scenario.is_terminal() {
            for reminder_type in [
                ReminderType::Reminder15Min,
                ReminderType::Reminder30Min,
                ReminderType::Reminder1Day,
            ] {
                Reminder::create(
                    &mut tx,
                    NewReminder {
                        client_id: processed.message.client_id.clone(),
                        message_id: processed.message.id,
                        reminder_type,
                        max_retry_attempts: self.config.reminders.max_retry_attempts,
                    },
                )
                .await?;
            }
        }

        if processed.requires_escalation {
            ChatSession::mark_escalated(&mut tx, &processed.message.client_id).await?;
        }

        tx.commit().await?;

        info!(
            message_id = %processed.message.id,
            response_id = %response.id,
            scenario = %processed.scenario,
            status = ?status,
            requires_escalation = processed.requires_escalation,
            "Message orchestration finished"
        );

        self.schedule_side_effects(&processed, &response, channel).await;

        Ok(OrchestrationResult {
            status,
            original_message_id: processed.message.id,
            response_message_id: Some(response.id),
            response_text: Some(draft.text),
            scenario: processed.scenario,
            confidence: processed.confidence,
            requires_escalation: processed.requires_escalation,
            priority: processed.priority,
            escalation_reason: processed.escalation_reason,
            priority_queue: processed.priority_queue,
            is_first_message: processed.is_first_message,
        })
    }

    /// Fire-and-forget delivery plus operator fan-out.
    async fn schedule_side_effects(
        &self,
        processed: &ProcessedMessage,
        response: &Message,
        channel: &SessionChannel,
    ) {
        // Prefer the session's cached coordinates, which the upsert merged
        let channel = match ChatSession::find_by_client(&self.pool, &processed.message.client_id)
            .await
        {
            Ok(Some(session)) => session.channel(),
            _ => channel.clone(),
        };

        let event = if processed.requires_escalation {
            events::MESSAGE_ESCALATED
        } else {
            events::MESSAGE_RECEIVED
        };
        let mut notification = OperatorNotification::new(
            event,
            &processed.message.client_id,
            processed.message.id,
            &processed.message.content,
        );
        if processed.requires_escalation {
            notification =
                notification.with_escalation(processed.priority, processed.escalation_reason);
        }
        self.delivery.notify_operators(notification);

        let delivery = Arc::clone(&self.delivery);
        let response = response.clone();
        let scenario = processed.scenario;
        tokio::spawn(async move {
            let receipt = delivery.send(&response, &channel, Some(scenario)).await;
            if !receipt.success {
                warn!(
                    message_id = %response.id,
                    error = receipt.error.as_deref().unwrap_or("unknown"),
                    retryable = receipt.retryable,
                    "Response delivery failed"
                );
            }
        });
    }

    /// Answer a retried submission with the original's committed outcome.
    async fn duplicate_result(
        &self,
        client_id: &str,
        original: Message,
    ) -> Result<OrchestrationResult> {
        let classification =
            Classification::find_latest_for_message(&self.pool, original.id).await?;
        let response =
            Message::find_bot_reply_since(&self.pool, client_id, original.created_at).await?;

        let (scenario, confidence) = classification
            .as_ref()
            .map(|c| (c.scenario(), c.confidence))
            .unwrap_or((Scenario::Unknown, 0.0));
        let escalation_reason = original.escalation_reason_typed();
        let priority = original.priority_level();

        self.delivery.notify_operators(OperatorNotification::new(
            events::MESSAGE_DUPLICATE,
            client_id,
            original.id,
            &original.content,
        ));

        Ok(OrchestrationResult {
            status: OrchestrationStatus::Duplicate,
            original_message_id: original.id,
            response_message_id: response.as_ref().map(|m| m.id),
            response_text: response.map(|m| m.content),
            scenario,
            confidence,
            requires_escalation: escalation_reason.is_some(),
            priority,
            escalation_reason,
            priority_queue: priority.priority_queue(),
            is_first_message: original.is_first_message,
        })
    }

    async fn save_classification(
        &self,
        message: &Message,
        scenario: Scenario,
        confidence: f64,
        model: String,
        reasoning: Option<String>,
    ) -> Result<Classification> {
        let mut tx = self.pool.begin().await?;
        let classification = Classification::create(
            &mut tx,
            NewClassification {
                message_id: message.id,
                detected_scenario: scenario,
                confidence,
                ai_model: model,
                reasoning,
            },
        )
        .await?;
        tx.commit().await?;
        Ok(classification)
    }

    fn fallback_processed(
        message: Message,
        is_first_message: bool,
        processed_text: String,
        reason: EscalationReason,
        priority: PriorityLevel,
    ) -> ProcessedMessage {
        ProcessedMessage {
            message,
            classification: None,
            scenario: Scenario::Unknown,
            confidence: 0.0,
            requires_escalation: true,
            priority,
            escalation_reason: Some(reason),
            priority_queue: priority.priority_queue(),
            is_first_message,
            processed_text,
        }
    }
}
