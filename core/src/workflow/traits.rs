use super::task::TaskStatus;

/// Receives run progress. Rendering must not block the scheduler.
pub trait EventRenderer: Send + Sync {
    fn name(&self) -> &str;
    fn render(&self, event: &RenderEvent);
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    RunStart {
        run_id: String,
        workflow: String,
        total_tasks: usize,
    },
    Plan {
        run_id: String,
        stages: Vec<Vec<String>>,
    },
    TaskStart {
        run_id: String,
        task_id: String,
        agent_id: String,
    },
    TaskEnd {
        run_id: String,
        task_id: String,
        status: TaskStatus,
        duration_ms: u64,
        error: Option<String>,
    },
    RunEnd {
        run_id: String,
        summary: RunSummary,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub cancelled: bool,
    pub duration_ms: u64,
}

/// Sizes the worker pool for a run.
pub trait ConcurrencyStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn calculate_concurrency(&self, context: &ConcurrencyContext) -> usize;
}

#[derive(Debug, Clone)]
pub struct ConcurrencyContext {
    pub available_cpus: usize,
    /// Tasks ready at run start.
    pub ready_tasks: usize,
    pub total_tasks: usize,
    pub base_concurrency: usize,
}
