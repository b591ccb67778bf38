use thiserror::Error;

use crate::{job::JobState, session::SessionId};

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Session {0} is not active")]
    SessionNotActive(SessionId),

    #[error("Exploit failed: {0}")]
    ExploitFailed(String),

    #[error("Invalid job transition for {key} from {from} to {to}")]
    InvalidTransition {
        key: String,
        from: JobState,
        to: JobState,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReconError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ReconError>;
