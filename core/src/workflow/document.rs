use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::prompt::Provider;

use super::events::{RunState, TaskEvent};
use super::task::{Task, TaskResult, TaskStatus};
use super::workflow::Workflow;

/// Agent reference in a serialized workflow. Handles are re-attached after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRef {
    pub id: String,
    #[serde(default)]
    pub provider: Provider,
}

/// Run state carried along with a serialized workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    #[serde(default)]
    pub statuses: BTreeMap<String, TaskStatus>,
    #[serde(default)]
    pub results: BTreeMap<String, TaskResult>,
    #[serde(default)]
    pub errors: BTreeMap<String, String>,
    #[serde(default)]
    pub events: Vec<TaskEvent>,
}

/// Serialized form of a [`Workflow`]. Tasks are listed in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub agents: Vec<AgentRef>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<RunSnapshot>,
}

impl Workflow {
    /// Snapshot of the graph; prompts are stored as they are now, unbound
    /// placeholders included.
    pub fn to_document(&self) -> WorkflowDocument {
        let snapshot = (!self.state.events.is_empty()).then(|| RunSnapshot {
            statuses: self
                .state
                .statuses
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            results: self
                .state
                .results
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            errors: self
                .state
                .errors
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            events: self.state.events.clone(),
        });

        WorkflowDocument {
            id: Some(self.id.clone()),
            name: self.name.clone(),
            agents: self
                .agents
                .iter()
                .map(|(id, slot)| AgentRef {
                    id: id.clone(),
                    provider: slot.provider,
                })
                .collect(),
            tasks: self.tasks().into_iter().cloned().collect(),
            snapshot,
        }
    }

    /// Rebuild a workflow, re-validating the graph. Agents come back declared
    /// but unattached; tasks that were Running come back Pending.
    pub fn from_document(document: WorkflowDocument) -> Result<Self, WorkflowError> {
        let mut workflow = Workflow::new(document.name);
        if let Some(id) = document.id {
            workflow.id = id;
        }
        for agent in document.agents {
            workflow.declare_agent(agent.id, agent.provider);
        }
        workflow.add_tasks(document.tasks)?;

        if let Some(snapshot) = document.snapshot {
            let mut state = RunState {
                statuses: snapshot.statuses.into_iter().collect(),
                results: snapshot.results.into_iter().collect(),
                errors: snapshot.errors.into_iter().collect(),
                events: snapshot.events,
            };
            state.statuses.retain(|id, _| workflow.tasks.contains_key(id));
            state.rewind_running();
            workflow.state = state;
        }

        Ok(workflow)
    }

    pub fn to_json(&self) -> Result<String, WorkflowError> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    pub fn from_json(json: &str) -> Result<Self, WorkflowError> {
        Self::from_document(serde_json::from_str(json)?)
    }

    pub fn to_yaml(&self) -> Result<String, WorkflowError> {
        Ok(serde_yaml::to_string(&self.to_document())?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, WorkflowError> {
        Self::from_document(serde_yaml::from_str(yaml)?)
    }
}
