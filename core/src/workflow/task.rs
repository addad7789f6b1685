use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::Usage;
use crate::error::WorkflowError;
use crate::output::OutputSchema;
use crate::prompt::{Prompt, Provider};

/// Per-task lifecycle. Pending is initial; Completed and Failed are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Check a status change for `task_id`.
    ///
    /// `Pending -> Failed` is only taken by cascade failure, when a task is
    /// abandoned without ever being dispatched.
    pub fn validate_transition(
        task_id: &str,
        from: TaskStatus,
        to: TaskStatus,
    ) -> Result<(), WorkflowError> {
        let is_valid = matches!(
            (from, to),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Failed)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        );

        if is_valid {
            Ok(())
        } else {
            Err(WorkflowError::InvalidTransition {
                task_id: task_id.to_string(),
                from,
                to,
            })
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One prompt dispatched to one agent, plus the tasks it waits for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: String,
    agent_id: String,
    prompt: Prompt,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<String>,
    /// Overrides the prompt's own output schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_schema: Option<OutputSchema>,
}

impl Task {
    pub fn new(id: impl Into<String>, agent_id: impl Into<String>, prompt: Prompt) -> Self {
        Self {
            id: id.into(),
            agent_id: agent_id.into(),
            prompt,
            dependencies: Vec::new(),
            output_schema: None,
        }
    }

    /// Replace the dependency list. Duplicates are dropped, first occurrence wins.
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.clear();
        for dep in dependencies {
            self = self.depends_on(dep);
        }
        self
    }

    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        let dependency = dependency.into();
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
        self
    }

    pub fn with_output_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn prompt(&self) -> &Prompt {
        &self.prompt
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn output_schema(&self) -> Option<&OutputSchema> {
        self.output_schema.as_ref()
    }

    /// Schema the response is validated against: the override, else the prompt's.
    pub fn effective_schema(&self) -> Option<&OutputSchema> {
        self.output_schema
            .as_ref()
            .or_else(|| self.prompt.output_schema())
    }
}

/// Outcome of a completed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub agent_id: String,
    pub provider: Provider,
    pub model: String,
    /// Raw response text.
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}
