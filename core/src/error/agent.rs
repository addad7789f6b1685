use thiserror::Error;

use super::code::ErrorCode;
use super::prompt::OutputError;
use crate::prompt::Provider;

/// Errors surfaced by agent collaborators and the dispatch helpers around them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("missing authentication for provider {provider}")]
    MissingAuthentication { provider: Provider },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider returned status {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("agent '{0}' has no attached handle")]
    Unbound(String),

    #[error("invalid agent response: {0}")]
    InvalidResponse(String),

    #[error("embedding has {actual} dimensions, expected {expected}")]
    EmbeddingDimension { expected: usize, actual: usize },

    #[error(transparent)]
    Output(#[from] OutputError),
}

impl AgentError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingAuthentication { .. } => ErrorCode::AuthError,
            Self::Transport(_) => ErrorCode::NetworkError,
            Self::Provider { .. } => ErrorCode::BackendError,
            Self::Unbound(_) => ErrorCode::AgentNotFound,
            Self::InvalidResponse(_) => ErrorCode::ParseError,
            Self::EmbeddingDimension { .. } => ErrorCode::ValidationError,
            Self::Output(e) => e.error_code(),
        }
    }
}
