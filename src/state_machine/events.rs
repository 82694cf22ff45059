use serde::{Deserialize, Serialize};
use std::fmt;

/// Events that drive dialog lifecycle transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogEvent {
    /// Client (or bot) activity observed; reopens a closed dialog
    Activity,
    /// Orchestrator routed a message to an operator
    Escalate,
    /// Inactivity sweep decided the dialog should close
    InactivityClose,
    /// Manual close by an operator
    Close,
    /// Manual reopen by an operator
    Reopen,
}

impl fmt::Display for DialogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activity => write!(f, "activity"),
            Self::Escalate => write!(f, "escalate"),
            Self::InactivityClose => write!(f, "inactivity_close"),
            Self::Close => write!(f, "close"),
            Self::Reopen => write!(f, "reopen"),
        }
    }
}
