use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::events::TaskEvent;
use super::task::{TaskResult, TaskStatus};

/// Final state of one task after a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub workflow_id: String,
    pub run_id: String,
    pub name: String,
    pub tasks: BTreeMap<String, TaskOutcome>,
    /// Full event log of the workflow, including earlier runs.
    pub events: Vec<TaskEvent>,
    /// Result of the deepest completed sink task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl WorkflowResult {
    pub fn status(&self, task_id: &str) -> Option<TaskStatus> {
        self.tasks.get(task_id).map(|outcome| outcome.status)
    }

    pub fn task_result(&self, task_id: &str) -> Option<&TaskResult> {
        self.tasks.get(task_id).and_then(|outcome| outcome.result.as_ref())
    }

    pub fn error(&self, task_id: &str) -> Option<&str> {
        self.tasks
            .get(task_id)
            .and_then(|outcome| outcome.error.as_deref())
    }

    /// True when every task completed.
    pub fn is_success(&self) -> bool {
        self.tasks
            .values()
            .all(|outcome| outcome.status == TaskStatus::Completed)
    }

    pub fn completed_count(&self) -> usize {
        self.count(TaskStatus::Completed)
    }

    pub fn failed_count(&self) -> usize {
        self.count(TaskStatus::Failed)
    }

    /// Tasks never dispatched: blocked upstream, or skipped by cancellation.
    pub fn pending_count(&self) -> usize {
        self.count(TaskStatus::Pending)
    }

    fn count(&self, status: TaskStatus) -> usize {
        self.tasks
            .values()
            .filter(|outcome| outcome.status == status)
            .count()
    }
}
