use thiserror::Error;

use super::agent::AgentError;
use super::code::ErrorCode;
use super::prompt::PromptError;
use crate::workflow::TaskStatus;

/// Workflow graph construction and execution errors
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Duplicate task ID: {0}")]
    DuplicateTaskId(String),

    #[error("Dependency not found: task '{task_id}' depends on '{missing_dep}'")]
    DependencyNotFound { task_id: String, missing_dep: String },

    #[error("Agent not found: task '{task_id}' references agent '{agent_id}'")]
    AgentNotFound { task_id: String, agent_id: String },

    #[error("Agent not declared in workflow: {0}")]
    UnknownAgent(String),

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid status transition for task '{task_id}': {from:?} -> {to:?}")]
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Runner error: {0}")]
    Runner(String),
}

impl WorkflowError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::DuplicateTaskId(_) => ErrorCode::ValidationError,
            Self::DependencyNotFound { .. } => ErrorCode::DependencyError,
            Self::AgentNotFound { .. } => ErrorCode::AgentNotFound,
            Self::UnknownAgent(_) => ErrorCode::AgentNotFound,
            Self::CircularDependency(_) => ErrorCode::CircularDependency,
            Self::TaskNotFound(_) => ErrorCode::TaskNotFound,
            Self::InvalidTransition { .. } => ErrorCode::ValidationError,
            Self::Agent(e) => e.error_code(),
            Self::Prompt(e) => e.error_code(),
            Self::Serialization(_) => ErrorCode::ParseError,
            Self::Runner(_) => ErrorCode::GeneralError,
        }
    }
}

impl From<serde_json::Error> for WorkflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for WorkflowError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
