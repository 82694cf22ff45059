//! # Support Core
//!
//! Message orchestration engine for AI-assisted customer support: ingests
//! inbound chat messages, classifies intent through an external gateway,
//! decides whether a human operator must be pulled in, drafts the automated
//! reply and reliably delivers it back to the originating channel, while
//! tracking conversation lifecycle and following up with reminders when the
//! client goes silent.
//!
//! ## Architecture
//!
//! - **Orchestration** ([`orchestration`]): serialized per-client intake with
//!   dedup and first-message detection, the mass-event pre-filter, the
//!   escalation rule engine, the response builder and the top-level
//!   [`MessageOrchestrator`].
//! - **Dialog lifecycle** ([`lifecycle`], [`state_machine`]): per-client
//!   conversation state with inactivity farewell, auto-close and reopen,
//!   driven by a pure transition function.
//! - **Reminders** ([`reminders`]): the 15min/30min/1day follow-up trio,
//!   claimed by a periodic sweep with skip-locked reads.
//! - **Delivery** ([`delivery`]): exactly-once-observed webhook dispatch with
//!   retry/backoff, humanizing scenario delays and best-effort operator
//!   fan-out.
//! - **Boundaries** ([`gateway`]): the classification and template traits the
//!   embedding application implements, with timeout and confidence-downgrade
//!   validation applied before results reach core logic.
//!
//! The datastore is the single source of truth; all cross-task coordination
//! happens through row locks (wait for first-message determination and
//! reminder cancellation, skip-locked for reminder claiming) held for one
//! unit of work.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use support_core::{
//!     config::SupportConfig,
//!     delivery::{DeliveryService, OperatorRegistry},
//!     orchestration::MessageOrchestrator,
//! };
//!
//! let config = SupportConfig::load()?;
//! let delivery = Arc::new(DeliveryService::new(
//!     config.delivery.clone(),
//!     OperatorRegistry::default(),
//! ));
//! let orchestrator = MessageOrchestrator::new(pool, config, gateway, renderer, delivery);
//! let result = orchestrator.process_message("client-1", "hi!", &channel).await?;
//! ```

pub mod config;
pub mod constants;
pub mod delivery;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod reminders;
pub mod state_machine;
pub mod workers;

pub use config::SupportConfig;
pub use constants::{EscalationReason, MessageType, PriorityLevel, ReminderType, Scenario};
pub use delivery::{DeliveryReceipt, DeliveryService, OperatorNotification, OperatorRegistry};
pub use error::{Result, SupportError};
pub use gateway::{
    BoundedClassification, BoundedClassifier, ClassificationGateway, ClassificationOutcome,
    TemplateRenderer,
};
pub use lifecycle::DialogLifecycle;
pub use models::{ChatSession, Classification, Message, Reminder, SessionChannel};
pub use orchestration::{MessageOrchestrator, OrchestrationResult, OrchestrationStatus};
pub use reminders::{ReminderService, ReminderWorker};
pub use state_machine::{DialogEvent, DialogState};
pub use workers::BackgroundWorkers;
