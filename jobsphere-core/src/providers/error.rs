//! Provider error types and handling

use crate::protocol::TaskType;
use thiserror::Error;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors raised while preparing a request or unwrapping a response envelope
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider kind cannot serve the task type
    #[error("provider '{provider}' does not serve {task}")]
    Unsupported { provider: String, task: TaskType },

    /// Kind needs a credential and none is configured
    #[error("provider '{provider}' has no credential configured")]
    MissingCredential { provider: String },

    /// Credential is present but not in the shape the kind needs
    #[error("provider '{provider}' has a malformed credential: {message}")]
    InvalidCredential { provider: String, message: String },

    /// Payload does not fit the kind (prompt sent to a job board, or the reverse)
    #[error("invalid payload for '{provider}': {message}")]
    InvalidPayload { provider: String, message: String },

    /// Response body is not the envelope the kind returns
    #[error("unexpected {kind} response: {message}")]
    Envelope { kind: String, message: String },

    /// Response parsing error
    #[error("failed to parse response: {0}")]
    ParseError(String),
}

impl ProviderError {
    pub(crate) fn envelope(kind: impl ToString, message: impl Into<String>) -> Self {
        ProviderError::Envelope {
            kind: kind.to_string(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::ParseError(err.to_string())
    }
}
