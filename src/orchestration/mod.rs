//! # Orchestration Pipeline
//!
//! The request-side core: serialized intake with dedup and first-message
//! detection, the mass-event pre-filter, the escalation rule engine, the
//! response builder and the top-level [`MessageOrchestrator`] coordinating
//! one message end to end.

pub mod core;
pub mod escalation;
pub mod intake;
pub mod mass_event;
pub mod response;
pub mod text;
pub mod types;

pub use self::core::MessageOrchestrator;
pub use escalation::{emotion_score, EscalationEngine};
pub use intake::MessageIntake;
pub use mass_event::{sequence_ratio, MassEventDetector};
pub use response::{ResponseBuilder, ResponseDraft};
pub use types::{
    EscalationDecision, IngestOutcome, MassEventReport, OrchestrationResult, OrchestrationStatus,
    ProcessedMessage,
};
