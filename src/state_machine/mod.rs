// Dialog lifecycle state machine
//
// Pure transition logic for per-client conversation state. Persistence and
// side effects (farewell delivery, timestamps) live in the lifecycle service;
// this module only answers "is this transition legal and where does it lead".

pub mod dialog_state_machine;
pub mod events;
pub mod states;

pub use dialog_state_machine::determine_target_state;
pub use events::DialogEvent;
pub use states::DialogState;

use thiserror::Error;

/// Errors raised by dialog state transitions
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateMachineError {
    #[error("Invalid transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },
    #[error("Internal state machine error: {0}")]
    Internal(String),
}

pub type StateMachineResult<T> = std::result::Result<T, StateMachineError>;
