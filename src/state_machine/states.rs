use serde::{Deserialize, Serialize};
use std::fmt;

/// Dialog state for one client's conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DialogState {
    /// Conversation is active
    #[default]
    Open,
    /// Conversation is open and flagged for operator attention; informational,
    /// never blocks activity updates
    Escalated,
    /// Conversation was closed after inactivity or manually; a new client
    /// message reopens it
    Closed,
}

impl DialogState {
    /// Closed dialogs receive no farewell or auto-close processing.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Activity (and sweeps) only apply to open-family states.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open | Self::Escalated)
    }
}

impl fmt::Display for DialogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Escalated => write!(f, "escalated"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for DialogState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "escalated" => Ok(Self::Escalated),
            "closed" => Ok(Self::Closed),
            _ => Err(format!("Invalid dialog state: {s}")),
        }
    }
}
