//! # Escalation & Priority Engine
//!
//! Decides whether a message needs a human operator and at what severity.
//! Rules apply cumulatively and are monotone: a later rule may raise the
//! level, never lower it. The final level maps onto the operator queue
//! position (1 = serviced first).

use chrono::{Duration, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::EscalationConfig;
use crate::constants::{EscalationReason, PriorityLevel, Scenario};
use crate::error::Result;
use crate::models::{Classification, Message};
use crate::orchestration::types::EscalationDecision;

pub struct EscalationEngine {
    pool: PgPool,
    config: EscalationConfig,
}

impl EscalationEngine {
    pub fn new(pool: PgPool, config: EscalationConfig) -> Self {
        Self { pool, config }
    }

    /// Evaluate the escalation rules for one classified message.
    #[instrument(skip(self, content), fields(client_id = %client_id, message_id = %message_id))]
    pub async fn evaluate(
        &self,
        message_id: Uuid,
        scenario: Scenario,
        confidence: f64,
        client_id: &str,
        content: &str,
    ) -> Result<EscalationDecision> {
        let mut reasons = Vec::new();
        let mut level = PriorityLevel::Low;

        // Rule 1: classification is below the trust threshold
        if confidence < self.config.confidence_threshold {
            reasons.push(EscalationReason::LowConfidence);
            level = level.max(PriorityLevel::Medium);
        }

        // Rule 2: the classifier could not name the intent at all
        if scenario == Scenario::Unknown {
            reasons.push(EscalationReason::UnknownScenario);
            level = level.max(PriorityLevel::High);
        }

        // Rule 3: repeated low-confidence classifications for this client
        let failure_cutoff =
            Utc::now() - Duration::hours(self.config.repeated_failure_window_hours);
        let recent_failures = Classification::low_confidence_count_since(
            &self.pool,
            client_id,
            self.config.hard_floor_confidence,
            failure_cutoff,
        )
        .await?;
        if recent_failures >= self.config.repeated_failure_count {
            let combined = !reasons.is_empty();
            reasons.push(EscalationReason::RepeatedFailed);
            level = level.max(if combined {
                PriorityLevel::High
            } else {
                PriorityLevel::Medium
            });
        }

        // Rule 4: frustrated repeated contact in a short window
        let contact_cutoff =
            Utc::now() - Duration::minutes(self.config.repeat_contact_window_minutes);
        let recent_contacts =
            Message::count_user_messages_since(&self.pool, client_id, contact_cutoff).await?;
        if recent_contacts >= self.config.repeat_contact_count {
            if !reasons.contains(&EscalationReason::RepeatedFailed) {
                reasons.push(EscalationReason::RepeatedFailed);
            }
            level = level.max(PriorityLevel::High);
        }

        // Rule 5: the client was already escalated recently
        let escalation_cutoff =
            Utc::now() - Duration::hours(self.config.recent_escalation_window_hours);
        if Message::has_escalated_reply_since(&self.pool, client_id, escalation_cutoff).await? {
            reasons.push(EscalationReason::Complaint);
            level = level.max(PriorityLevel::Critical);
        }

        // Rule 6: lexical/emoji emotion scan of the raw content
        let emotion = emotion_score(content);
        if emotion > self.config.emotion_score_threshold {
            if !reasons.contains(&EscalationReason::Complaint) {
                reasons.push(EscalationReason::Complaint);
            }
            level = level.bumped();
        }

        let should_escalate =
            !reasons.is_empty() || confidence < self.config.hard_floor_confidence;

        let decision = EscalationDecision {
            should_escalate,
            priority_queue: level.priority_queue(),
            level,
            reasons,
        };

        debug!(
            should_escalate = decision.should_escalate,
            level = %decision.level,
            reasons = ?decision.reasons,
            emotion_score = emotion,
            "Escalation evaluated"
        );

        Ok(decision)
    }
}

/// Weighted negative-signal table for the emotion scan. Weights sum past 1.0
/// deliberately; the score is capped.
const NEGATIVE_WORDS: &[(&str, f64)] = &[
    ("terrible", 0.30),
    ("awful", 0.30),
    ("horrible", 0.30),
    ("useless", 0.25),
    ("scam", 0.35),
    ("refund", 0.25),
    ("complaint", 0.30),
    ("angry", 0.30),
    ("furious", 0.35),
    ("disappointed", 0.25),
    ("worst", 0.30),
    ("never works", 0.30),
    ("fed up", 0.30),
    ("sick of", 0.30),
    ("unacceptable", 0.35),
];

const NEGATIVE_EMOJI: &[(&str, f64)] = &[
    ("😡", 0.35),
    ("🤬", 0.40),
    ("😠", 0.30),
    ("👎", 0.25),
    ("😤", 0.25),
    ("💢", 0.25),
];

/// Score the emotional negativity of a message in [0, 1].
///
/// Signals: repeated terminal punctuation, shouting (long all-caps runs),
/// explicit negative vocabulary, and negative emoji.
pub fn emotion_score(content: &str) -> f64 {
    let lower = content.to_lowercase();
    let mut score = 0.0f64;

    if content.contains("!!") {
        score += 0.20;
    }
    if content.contains("??") {
        score += 0.15;
    }

    // A run of 4+ uppercase letters reads as shouting
    let mut caps_run = 0usize;
    let mut shouting = false;
    for c in content.chars() {
        if c.is_uppercase() {
            caps_run += 1;
            if caps_run >= 4 {
                shouting = true;
                break;
            }
        } else if c.is_alphabetic() {
            caps_run = 0;
        }
    }
    if shouting {
        score += 0.20;
    }

    for (word, weight) in NEGATIVE_WORDS {
        if lower.contains(word) {
            score += weight;
        }
    }
    for (emoji, weight) in NEGATIVE_EMOJI {
        if content.contains(emoji) {
            score += weight;
        }
    }

    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_text_scores_low() {
        assert!(emotion_score("hello, when is my next lesson?") < 0.2);
    }

    #[test]
    fn test_negative_vocabulary_accumulates() {
        let score = emotion_score("this is terrible and useless, i want a refund");
        assert!(score > 0.5, "score was {score}");
    }

    #[test]
    fn test_punctuation_and_shouting_alone_stay_below_threshold() {
        // Repeated punctuation without negative vocabulary is not a complaint
        let score = emotion_score("are you there??");
        assert!(score <= 0.5, "score was {score}");
    }

    #[test]
    fn test_emoji_plus_vocabulary_crosses_threshold() {
        let score = emotion_score("worst support ever 😡");
        assert!(score > 0.5, "score was {score}");
    }

    #[test]
    fn test_score_is_capped_at_one() {
        let score =
            emotion_score("TERRIBLE awful horrible useless scam refund complaint 😡🤬👎!!??");
        assert_eq!(score, 1.0);
    }
}
