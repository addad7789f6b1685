use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WorkflowError;

use super::task::{TaskResult, TaskStatus};

/// One status change of one task. Events are only ever appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    pub id: String,
    pub workflow_id: String,
    pub task_id: String,
    pub previous: TaskStatus,
    pub status: TaskStatus,
    pub timestamp: DateTime<Utc>,
    /// Error detail for failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Time spent running, on terminal events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Mutable run state of a workflow: statuses, results, errors and the event log.
///
/// Only the scheduler's driver loop writes here, once per task transition.
#[derive(Debug, Clone, Default)]
pub(crate) struct RunState {
    pub(crate) statuses: HashMap<String, TaskStatus>,
    pub(crate) results: HashMap<String, TaskResult>,
    pub(crate) errors: HashMap<String, String>,
    pub(crate) events: Vec<TaskEvent>,
}

impl RunState {
    pub(crate) fn status(&self, task_id: &str) -> TaskStatus {
        self.statuses.get(task_id).copied().unwrap_or_default()
    }

    /// Move `task_id` to `to` and append the matching event.
    pub(crate) fn transition(
        &mut self,
        workflow_id: &str,
        task_id: &str,
        to: TaskStatus,
        details: Option<String>,
        duration_ms: Option<u64>,
    ) -> Result<&TaskEvent, WorkflowError> {
        let from = self.status(task_id);
        TaskStatus::validate_transition(task_id, from, to)?;

        self.statuses.insert(task_id.to_string(), to);
        if to == TaskStatus::Failed {
            if let Some(detail) = &details {
                self.errors.insert(task_id.to_string(), detail.clone());
            }
        }

        self.events.push(TaskEvent {
            id: Uuid::new_v4().to_string(),
            workflow_id: workflow_id.to_string(),
            task_id: task_id.to_string(),
            previous: from,
            status: to,
            timestamp: Utc::now(),
            details,
            duration_ms,
        });

        let last = self.events.len() - 1;
        Ok(&self.events[last])
    }

    pub(crate) fn complete(
        &mut self,
        workflow_id: &str,
        result: TaskResult,
    ) -> Result<(), WorkflowError> {
        let task_id = result.task_id.clone();
        self.transition(
            workflow_id,
            &task_id,
            TaskStatus::Completed,
            None,
            Some(result.duration_ms),
        )?;
        self.results.insert(task_id, result);
        Ok(())
    }

    /// Tasks still Running when a run was interrupted go back to Pending.
    pub(crate) fn rewind_running(&mut self) {
        for status in self.statuses.values_mut() {
            if *status == TaskStatus::Running {
                *status = TaskStatus::Pending;
            }
        }
    }
}
