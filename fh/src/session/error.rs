//! Session error types

use std::time::Duration;
use thiserror::Error;

/// Errors a session call can fail with
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Session is not logged in")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl SessionError {
    /// Whether a workflow should back off and try again instead of giving up
    pub fn is_transient(&self) -> bool {
        match self {
            SessionError::RateLimited { .. } => true,
            SessionError::Network(_) => true,
            SessionError::Unauthorized => false,
            SessionError::NotFound(_) => false,
            SessionError::Protocol(_) => false,
        }
    }

    /// Server-requested back-off, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SessionError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}
