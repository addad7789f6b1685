//! Prompt binding, prompt-injection sanitization and DAG scheduling for
//! multi-step LLM agent pipelines.
//!
//! A [`prompt::Prompt`] is bound with caller values (sanitized when the prompt
//! carries a [`sanitize::SanitizationConfig`]), wrapped in a
//! [`workflow::Task`], and scheduled by a [`workflow::Workflow`] against the
//! [`agent::Agent`]s it references.

pub mod agent;
pub mod config;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod output;
pub mod prompt;
pub mod sanitize;
pub mod workflow;

pub use agent::{Agent, AgentResponse};
pub use error::{AgentError, ErrorCode, OutputError, PromptError, SanitizeError, WorkflowError};
pub use prompt::{Message, Prompt, Provider, Role};
pub use sanitize::{SanitizationConfig, SanitizationResult};
pub use workflow::{Task, TaskStatus, Workflow, WorkflowResult};
