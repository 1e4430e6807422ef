use serde::{Deserialize, Serialize};
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Language model call failed: {0}")]
    OracleFault(String),

    #[error("Capability {name} failed: {reason}")]
    CapabilityFault { name: String, reason: String },

    #[error("Unknown handler identifier: {0}")]
    UnknownHandler(String),

    #[error("Malformed action request: {0}")]
    MalformedActionRequest(String),

    #[error("Invalid transcript: {0}")]
    InvalidTranscript(String),

    #[error("Timed out after {0} ms waiting for {1}")]
    Timeout(u128, String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    pub fn oracle(err: impl std::fmt::Display) -> Self {
        AgentError::OracleFault(err.to_string())
    }

    pub fn capability(name: impl Into<String>, err: impl std::fmt::Display) -> Self {
        AgentError::CapabilityFault {
            name: name.into(),
            reason: err.to_string(),
        }
    }
}

pub type AgentResult<T> = Result<T, AgentError>;
