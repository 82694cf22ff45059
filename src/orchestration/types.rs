//! Shared result types for the orchestration pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{EscalationReason, PriorityLevel, Scenario};
use crate::models::{Classification, Message};

/// Outcome of message intake
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// New message accepted and persisted
    Accepted {
        message: Message,
        is_first_message: bool,
    },
    /// Byte-identical submission inside the dedup window; upstream retries
    /// get the original's outcome instead of reprocessing
    Duplicate { original: Message },
    /// Client exceeded the per-minute message budget
    RateLimited,
}

/// Terminal status of one orchestration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationStatus {
    /// Classified and answered automatically
    Success,
    /// Classification unavailable or input was noise; fallback response sent
    Fallback,
    /// Routed to a human operator
    Escalated,
    /// Duplicate submission; original outcome returned
    Duplicate,
}

/// Everything known about a message after the processing stage
#[derive(Debug, Clone)]
pub struct ProcessedMessage {
    pub message: Message,
    pub classification: Option<Classification>,
    pub scenario: Scenario,
    pub confidence: f64,
    pub requires_escalation: bool,
    pub priority: PriorityLevel,
    pub escalation_reason: Option<EscalationReason>,
    pub priority_queue: i32,
    pub is_first_message: bool,
    pub processed_text: String,
}

/// The record handed back to the synchronous caller (the thin web layer
/// shapes its JSON from this).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub status: OrchestrationStatus,
    pub original_message_id: Uuid,
    pub response_message_id: Option<Uuid>,
    pub response_text: Option<String>,
    pub scenario: Scenario,
    pub confidence: f64,
    pub requires_escalation: bool,
    pub priority: PriorityLevel,
    pub escalation_reason: Option<EscalationReason>,
    pub priority_queue: i32,
    pub is_first_message: bool,
}

/// Result of the escalation engine for one message
#[derive(Debug, Clone, PartialEq)]
pub struct EscalationDecision {
    pub should_escalate: bool,
    pub level: PriorityLevel,
    pub reasons: Vec<EscalationReason>,
    pub priority_queue: i32,
}

/// Result of the mass-event scan for one candidate message
#[derive(Debug, Clone, PartialEq)]
pub struct MassEventReport {
    pub is_mass_event: bool,
    pub similar_count: usize,
    pub avg_similarity: f64,
}
