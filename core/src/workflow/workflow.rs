use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::agent::Agent;
use crate::error::WorkflowError;
use crate::prompt::Provider;

use super::engine::WorkflowExecutor;
use super::events::{RunState, TaskEvent};
use super::graph::TaskGraph;
use super::result::WorkflowResult;
use super::task::{Task, TaskResult, TaskStatus};

/// A declared agent. The handle is absent for workflows loaded from a document
/// until [`Workflow::attach_agent`] supplies it.
#[derive(Clone)]
pub(crate) struct AgentSlot {
    pub(crate) provider: Provider,
    pub(crate) handle: Option<Arc<dyn Agent>>,
}

impl fmt::Debug for AgentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentSlot")
            .field("provider", &self.provider)
            .field("attached", &self.handle.is_some())
            .finish()
    }
}

/// A validated DAG of tasks plus the agents they reference.
///
/// Graph edits and runs both need `&mut self`, so the graph cannot change
/// while a run is in progress.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub(super) id: String,
    pub(super) name: String,
    pub(super) agents: BTreeMap<String, AgentSlot>,
    pub(super) tasks: HashMap<String, Task>,
    pub(super) graph: TaskGraph,
    pub(super) state: RunState,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            agents: BTreeMap::new(),
            tasks: HashMap::new(),
            graph: TaskGraph::default(),
            state: RunState::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register an agent under its own id, replacing any previous one.
    pub fn add_agent(&mut self, agent: Arc<dyn Agent>) {
        let id = agent.id().to_string();
        debug!(workflow = %self.name, agent = %id, "agent added");
        self.agents.insert(
            id,
            AgentSlot {
                provider: agent.provider(),
                handle: Some(agent),
            },
        );
    }

    pub fn with_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.add_agent(agent);
        self
    }

    /// Declare an agent id without a handle.
    pub fn declare_agent(&mut self, id: impl Into<String>, provider: Provider) {
        self.agents
            .entry(id.into())
            .or_insert(AgentSlot {
                provider,
                handle: None,
            });
    }

    /// Supply the handle for an already declared agent.
    pub fn attach_agent(&mut self, agent: Arc<dyn Agent>) -> Result<(), WorkflowError> {
        let slot = self
            .agents
            .get_mut(agent.id())
            .ok_or_else(|| WorkflowError::UnknownAgent(agent.id().to_string()))?;
        slot.provider = agent.provider();
        slot.handle = Some(agent);
        Ok(())
    }

    /// Declared agent ids, sorted.
    pub fn agent_ids(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }

    pub fn agent_provider(&self, agent_id: &str) -> Option<Provider> {
        self.agents.get(agent_id).map(|slot| slot.provider)
    }

    pub fn is_agent_attached(&self, agent_id: &str) -> bool {
        self.agents
            .get(agent_id)
            .is_some_and(|slot| slot.handle.is_some())
    }

    pub fn add_task(&mut self, task: Task) -> Result<(), WorkflowError> {
        self.add_tasks(vec![task])
    }

    pub fn with_task(mut self, task: Task) -> Result<Self, WorkflowError> {
        self.add_task(task)?;
        Ok(self)
    }

    /// Add a batch of tasks. Tasks in the batch may reference each other in any
    /// order; the workflow is left untouched if any check fails.
    pub fn add_tasks(&mut self, tasks: Vec<Task>) -> Result<(), WorkflowError> {
        for task in &tasks {
            if !self.agents.contains_key(task.agent_id()) {
                return Err(WorkflowError::AgentNotFound {
                    task_id: task.id().to_string(),
                    agent_id: task.agent_id().to_string(),
                });
            }
        }

        let graph = TaskGraph::from_tasks(self.tasks_in_order().chain(tasks.iter()))?;
        graph.validate()?;

        for task in tasks {
            debug!(workflow = %self.name, task_id = %task.id(), "task added");
            self.tasks.insert(task.id().to_string(), task);
        }
        self.graph = graph;
        Ok(())
    }

    /// Tasks in declaration order.
    pub fn tasks(&self) -> Vec<&Task> {
        self.tasks_in_order().collect()
    }

    fn tasks_in_order(&self) -> impl Iterator<Item = &Task> {
        self.graph
            .task_ids()
            .iter()
            .filter_map(|id| self.tasks.get(id))
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    /// Task ids in declaration order.
    pub fn task_ids(&self) -> Vec<String> {
        self.graph.task_ids().to_vec()
    }

    pub fn task_count(&self) -> usize {
        self.graph.len()
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Stages of tasks that may run together, dependencies first.
    pub fn execution_plan(&self) -> Result<Vec<Vec<String>>, WorkflowError> {
        self.graph.topological_sort()
    }

    pub fn status(&self, task_id: &str) -> Option<TaskStatus> {
        self.tasks
            .contains_key(task_id)
            .then(|| self.state.status(task_id))
    }

    pub fn result(&self, task_id: &str) -> Option<&TaskResult> {
        self.state.results.get(task_id)
    }

    pub fn error(&self, task_id: &str) -> Option<&str> {
        self.state.errors.get(task_id).map(String::as_str)
    }

    /// Ordered status-change log across all runs.
    pub fn events(&self) -> &[TaskEvent] {
        &self.state.events
    }

    /// True once every task is Completed or Failed.
    pub fn is_complete(&self) -> bool {
        self.graph
            .task_ids()
            .iter()
            .all(|id| self.state.status(id).is_terminal())
    }

    pub fn pending_count(&self) -> usize {
        self.graph
            .task_ids()
            .iter()
            .filter(|id| self.state.status(id) == TaskStatus::Pending)
            .count()
    }

    /// Forget statuses, results and events.
    pub fn reset(&mut self) {
        self.state = RunState::default();
    }

    /// Same graph and agents under a new id, with no run history.
    pub fn fork(&self) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: self.name.clone(),
            agents: self.agents.clone(),
            tasks: self.tasks.clone(),
            graph: self.graph.clone(),
            state: RunState::default(),
        }
    }

    /// Run with default executor settings. Pending tasks from an earlier run resume.
    pub async fn run(&mut self) -> Result<WorkflowResult, WorkflowError> {
        WorkflowExecutor::new().run(self).await
    }

    /// Run with `context` (a JSON object) bound into every task prompt first.
    pub async fn run_with_context(&mut self, context: Value) -> Result<WorkflowResult, WorkflowError> {
        WorkflowExecutor::new().with_context(context).run(self).await
    }

    pub async fn run_with_cancellation(
        &mut self,
        token: CancellationToken,
    ) -> Result<WorkflowResult, WorkflowError> {
        WorkflowExecutor::new()
            .with_cancellation(token)
            .run(self)
            .await
    }
}
