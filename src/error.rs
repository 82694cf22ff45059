use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum SupportError {
    DatabaseError(String),
    StateTransitionError(String),
    ValidationError(String),
    ConfigurationError(String),
}

impl fmt::Display for SupportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupportError::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            SupportError::StateTransitionError(msg) => write!(f, "State transition error: {msg}"),
            SupportError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            SupportError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for SupportError {}

impl From<sqlx::Error> for SupportError {
    fn from(err: sqlx::Error) -> Self {
        SupportError::DatabaseError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SupportError>;
