//! # System Constants and Closed Enums
//!
//! Core enums and event name constants that define the operational boundaries
//! of the support orchestration core.
//!
//! All enums coming from external boundaries (the classification gateway, the
//! datastore) are closed: parsing an unexpected string never propagates a raw
//! value into core logic. Boundary adapters map invalid input to the safe
//! default variant instead (`Scenario::Unknown`, `PriorityLevel::Low`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Re-export dialog lifecycle state for convenience
pub use crate::state_machine::DialogState as DialogStatus;

/// Core system events emitted through the operator notification channel
pub mod events {
    pub const MESSAGE_RECEIVED: &str = "message.received";
    pub const MESSAGE_ESCALATED: &str = "message.escalated";
    pub const MESSAGE_DUPLICATE: &str = "message.duplicate";
    pub const DIALOG_FAREWELL_SENT: &str = "dialog.farewell_sent";
    pub const DIALOG_CLOSED: &str = "dialog.closed";
    pub const DIALOG_REOPENED: &str = "dialog.reopened";
    pub const REMINDER_SENT: &str = "reminder.sent";
    pub const REMINDER_FAILED: &str = "reminder.failed";
}

/// Client intent categories produced by the classification gateway.
///
/// `MassOutage` is never produced by the gateway itself; the mass-event
/// detector overrides the classification with it before the gateway is
/// consulted during an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scenario {
    Greeting,
    GreetingTimeRequest,
    Referral,
    TechSupportBasic,
    Farewell,
    Reminder,
    AbsenceRequest,
    ScheduleChange,
    Complaint,
    MissingTrainer,
    MassOutage,
    ReviewBonus,
    CrossExtension,
    Escalated,
    Unknown,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Greeting => "GREETING",
            Scenario::GreetingTimeRequest => "GREETING_TIME_REQUEST",
            Scenario::Referral => "REFERRAL",
            Scenario::TechSupportBasic => "TECH_SUPPORT_BASIC",
            Scenario::Farewell => "FAREWELL",
            Scenario::Reminder => "REMINDER",
            Scenario::AbsenceRequest => "ABSENCE_REQUEST",
            Scenario::ScheduleChange => "SCHEDULE_CHANGE",
            Scenario::Complaint => "COMPLAINT",
            Scenario::MissingTrainer => "MISSING_TRAINER",
            Scenario::MassOutage => "MASS_OUTAGE",
            Scenario::ReviewBonus => "REVIEW_BONUS",
            Scenario::CrossExtension => "CROSS_EXTENSION",
            Scenario::Escalated => "ESCALATED",
            Scenario::Unknown => "UNKNOWN",
        }
    }

    /// Parse a gateway-supplied scenario label, defaulting to `Unknown` for
    /// anything outside the closed set.
    pub fn parse_lenient(s: &str) -> Self {
        Self::from_str(s).unwrap_or(Scenario::Unknown)
    }

    /// Scenarios that always require a human operator regardless of
    /// classification confidence.
    pub fn is_always_escalated(&self) -> bool {
        matches!(
            self,
            Scenario::ScheduleChange
                | Scenario::Complaint
                | Scenario::MissingTrainer
                | Scenario::CrossExtension
                | Scenario::Unknown
        )
    }

    /// Terminal scenarios that never get follow-up reminders.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Scenario::Farewell | Scenario::Unknown | Scenario::Reminder
        )
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "GREETING" => Ok(Scenario::Greeting),
            "GREETING_TIME_REQUEST" => Ok(Scenario::GreetingTimeRequest),
            "REFERRAL" => Ok(Scenario::Referral),
            "TECH_SUPPORT_BASIC" => Ok(Scenario::TechSupportBasic),
            "FAREWELL" => Ok(Scenario::Farewell),
            "REMINDER" => Ok(Scenario::Reminder),
            "ABSENCE_REQUEST" => Ok(Scenario::AbsenceRequest),
            "SCHEDULE_CHANGE" => Ok(Scenario::ScheduleChange),
            "COMPLAINT" => Ok(Scenario::Complaint),
            "MISSING_TRAINER" => Ok(Scenario::MissingTrainer),
            "MASS_OUTAGE" => Ok(Scenario::MassOutage),
            "REVIEW_BONUS" => Ok(Scenario::ReviewBonus),
            "CROSS_EXTENSION" => Ok(Scenario::CrossExtension),
            "ESCALATED" => Ok(Scenario::Escalated),
            "UNKNOWN" => Ok(Scenario::Unknown),
            _ => Err(format!("Invalid scenario: {s}")),
        }
    }
}

/// Author/kind of a persisted message row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    User,
    BotAuto,
    BotEscalated,
    Operator,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::User => "user",
            MessageType::BotAuto => "bot_auto",
            MessageType::BotEscalated => "bot_escalated",
            MessageType::Operator => "operator",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageType::User),
            "bot_auto" => Ok(MessageType::BotAuto),
            "bot_escalated" => Ok(MessageType::BotEscalated),
            "operator" => Ok(MessageType::Operator),
            _ => Err(format!("Invalid message type: {s}")),
        }
    }
}

/// Escalation severity, ordered LOW < MEDIUM < HIGH < CRITICAL.
///
/// The derived `Ord` gives the escalation engine its monotonicity guarantee:
/// later rules raise severity with `max`, never lower it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityLevel::Low => "low",
            PriorityLevel::Medium => "medium",
            PriorityLevel::High => "high",
            PriorityLevel::Critical => "critical",
        }
    }

    /// Queue position for operators, 1 is serviced first.
    pub fn priority_queue(&self) -> i32 {
        match self {
            PriorityLevel::Critical => 1,
            PriorityLevel::High => 3,
            PriorityLevel::Medium => 7,
            PriorityLevel::Low => 10,
        }
    }

    /// One notch up, saturating at CRITICAL.
    pub fn bumped(&self) -> Self {
        match self {
            PriorityLevel::Low => PriorityLevel::Medium,
            PriorityLevel::Medium => PriorityLevel::High,
            PriorityLevel::High | PriorityLevel::Critical => PriorityLevel::Critical,
        }
    }

    /// Parse a boundary value, defaulting to LOW for anything malformed.
    pub fn parse_lenient(s: &str) -> Self {
        Self::from_str(s).unwrap_or_default()
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PriorityLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "low" => Ok(PriorityLevel::Low),
            "medium" => Ok(PriorityLevel::Medium),
            "high" => Ok(PriorityLevel::High),
            "critical" => Ok(PriorityLevel::Critical),
            _ => Err(format!("Invalid priority level: {s}")),
        }
    }
}

/// Why a message was routed to an operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    LowConfidence,
    RepeatedFailed,
    Complaint,
    UnknownScenario,
    OperatorMarked,
    SystemError,
}

impl EscalationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationReason::LowConfidence => "low_confidence",
            EscalationReason::RepeatedFailed => "repeated_failed",
            EscalationReason::Complaint => "complaint",
            EscalationReason::UnknownScenario => "unknown_scenario",
            EscalationReason::OperatorMarked => "operator_marked",
            EscalationReason::SystemError => "system_error",
        }
    }
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EscalationReason {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "low_confidence" => Ok(EscalationReason::LowConfidence),
            "repeated_failed" => Ok(EscalationReason::RepeatedFailed),
            "complaint" => Ok(EscalationReason::Complaint),
            "unknown_scenario" => Ok(EscalationReason::UnknownScenario),
            "operator_marked" => Ok(EscalationReason::OperatorMarked),
            "system_error" => Ok(EscalationReason::SystemError),
            _ => Err(format!("Invalid escalation reason: {s}")),
        }
    }
}

/// Follow-up cadence for unanswered bot responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderType {
    Reminder15Min,
    Reminder30Min,
    Reminder1Day,
}

impl ReminderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderType::Reminder15Min => "reminder_15min",
            ReminderType::Reminder30Min => "reminder_30min",
            ReminderType::Reminder1Day => "reminder_1day",
        }
    }

    /// Offset from creation to the scheduled send.
    pub fn delay(&self) -> chrono::Duration {
        match self {
            ReminderType::Reminder15Min => chrono::Duration::minutes(15),
            ReminderType::Reminder30Min => chrono::Duration::minutes(30),
            ReminderType::Reminder1Day => chrono::Duration::days(1),
        }
    }
}

impl fmt::Display for ReminderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReminderType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "reminder_15min" => Ok(ReminderType::Reminder15Min),
            "reminder_30min" => Ok(ReminderType::Reminder30Min),
            "reminder_1day" => Ok(ReminderType::Reminder1Day),
            _ => Err(format!("Invalid reminder type: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_round_trip() {
        for s in [
            Scenario::Greeting,
            Scenario::MassOutage,
            Scenario::CrossExtension,
            Scenario::Unknown,
        ] {
            assert_eq!(Scenario::from_str(s.as_str()).unwrap(), s);
        }
    }

    #[test]
    fn test_scenario_lenient_parse_defaults_to_unknown() {
        assert_eq!(Scenario::parse_lenient("NOT_A_SCENARIO"), Scenario::Unknown);
        assert_eq!(Scenario::parse_lenient(""), Scenario::Unknown);
    }

    #[test]
    fn test_priority_ordering_and_queue_mapping() {
        assert!(PriorityLevel::Critical > PriorityLevel::High);
        assert!(PriorityLevel::High > PriorityLevel::Medium);
        assert!(PriorityLevel::Medium > PriorityLevel::Low);

        assert_eq!(PriorityLevel::Critical.priority_queue(), 1);
        assert_eq!(PriorityLevel::High.priority_queue(), 3);
        assert_eq!(PriorityLevel::Medium.priority_queue(), 7);
        assert_eq!(PriorityLevel::Low.priority_queue(), 10);
    }

    #[test]
    fn test_priority_bump_saturates() {
        assert_eq!(PriorityLevel::Low.bumped(), PriorityLevel::Medium);
        assert_eq!(PriorityLevel::Critical.bumped(), PriorityLevel::Critical);
    }

    #[test]
    fn test_priority_lenient_parse_defaults_to_low() {
        assert_eq!(PriorityLevel::parse_lenient("urgent!!"), PriorityLevel::Low);
    }

    #[test]
    fn test_always_escalated_scenarios() {
        assert!(Scenario::ScheduleChange.is_always_escalated());
        assert!(Scenario::Unknown.is_always_escalated());
        assert!(!Scenario::Greeting.is_always_escalated());
        assert!(!Scenario::Referral.is_always_escalated());
    }

    #[test]
    fn test_reminder_delays() {
        assert_eq!(
            ReminderType::Reminder15Min.delay(),
            chrono::Duration::minutes(15)
        );
        assert_eq!(ReminderType::Reminder1Day.delay(), chrono::Duration::days(1));
    }
}
