pub mod agent;
pub mod code;
pub mod prompt;
pub mod workflow;

pub use agent::AgentError;
pub use code::ErrorCode;
pub use prompt::{OutputError, PromptError, SanitizeError};
pub use workflow::WorkflowError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
