use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::config::ExecutorConfig;
use crate::error::WorkflowError;
use crate::sanitize::SanitizationConfig;

use super::result::{TaskOutcome, WorkflowResult};
use super::scheduler::{self, emit, DriveOptions};
use super::task::TaskStatus;
use super::traits::{ConcurrencyContext, ConcurrencyStrategy, EventRenderer, RenderEvent, RunSummary};
use super::workflow::Workflow;

/// Runs workflows: pool sizing, rendering, cancellation and result assembly.
#[derive(Clone)]
pub struct WorkflowExecutor {
    max_parallel: Option<usize>,
    cascade_failures: bool,
    renderer: Option<Arc<dyn EventRenderer>>,
    concurrency_strategy: Option<Arc<dyn ConcurrencyStrategy>>,
    context: Option<Value>,
    sanitization: Option<SanitizationConfig>,
    cancel: CancellationToken,
}

pub struct WorkflowExecutorBuilder {
    inner: WorkflowExecutor,
}

impl fmt::Debug for WorkflowExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowExecutor")
            .field("max_parallel", &self.max_parallel)
            .field("cascade_failures", &self.cascade_failures)
            .field("renderer", &self.renderer.as_ref().map(|r| r.name().to_string()))
            .field(
                "concurrency_strategy",
                &self.concurrency_strategy.as_ref().map(|s| s.name().to_string()),
            )
            .field(
                "sanitization",
                &self.sanitization.as_ref().map(|c| c.preset.clone()),
            )
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl Default for WorkflowExecutor {
    fn default() -> Self {
        Self {
            max_parallel: None,
            cascade_failures: false,
            renderer: None,
            concurrency_strategy: None,
            context: None,
            sanitization: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl WorkflowExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> WorkflowExecutorBuilder {
        WorkflowExecutorBuilder {
            inner: Self::default(),
        }
    }

    /// Builder seeded from configuration. Strategy and renderer are wired by the caller.
    pub fn from_config(config: &ExecutorConfig) -> WorkflowExecutorBuilder {
        let builder = Self::builder().cascade_failures(config.cascade_failures);
        match config.max_parallel {
            Some(n) => builder.max_parallel(n),
            None => builder,
        }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels runs started by this executor.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute every runnable task of `workflow`.
    ///
    /// Tasks left Pending by an earlier run (blocked or cancelled) resume;
    /// terminal tasks are not re-run.
    pub async fn run(&self, workflow: &mut Workflow) -> Result<WorkflowResult, WorkflowError> {
        let context = self.context_bindings()?;
        let stages = workflow.execution_plan()?;
        let run_id = Uuid::new_v4().to_string();
        let start = Instant::now();

        let pool_size = self.pool_size(workflow);
        info!(
            workflow = %workflow.name,
            run_id = %run_id,
            tasks = workflow.task_count(),
            stages = stages.len(),
            pool_size,
            "workflow run started"
        );

        emit(
            &self.renderer,
            RenderEvent::RunStart {
                run_id: run_id.clone(),
                workflow: workflow.name.clone(),
                total_tasks: workflow.task_count(),
            },
        );
        emit(
            &self.renderer,
            RenderEvent::Plan {
                run_id: run_id.clone(),
                stages,
            },
        );

        let opts = DriveOptions {
            run_id: &run_id,
            pool_size,
            cascade_failures: self.cascade_failures,
            context: context.as_ref(),
            sanitization: self.sanitization.as_ref(),
            renderer: &self.renderer,
            cancel: &self.cancel,
        };
        let cancelled = scheduler::drive(workflow, &opts).await?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let result = collect_result(workflow, run_id.clone(), cancelled, duration_ms)?;
        let summary = RunSummary {
            total: result.tasks.len(),
            completed: result.completed_count(),
            failed: result.failed_count(),
            pending: result.pending_count(),
            cancelled,
            duration_ms,
        };

        info!(
            workflow = %workflow.name,
            run_id = %run_id,
            completed = summary.completed,
            failed = summary.failed,
            pending = summary.pending,
            cancelled,
            duration_ms,
            "workflow run finished"
        );
        emit(&self.renderer, RenderEvent::RunEnd { run_id, summary });

        Ok(result)
    }

    fn context_bindings(&self) -> Result<Option<Map<String, Value>>, WorkflowError> {
        match &self.context {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map.clone())),
            Some(other) => Err(WorkflowError::Runner(format!(
                "run context must be a JSON object, got {}",
                json_kind(other)
            ))),
        }
    }

    fn pool_size(&self, workflow: &Workflow) -> usize {
        let available_cpus = num_cpus::get().max(1);
        let base_concurrency = self.max_parallel.unwrap_or(available_cpus);

        self.concurrency_strategy
            .as_ref()
            .map(|strategy| {
                let context = ConcurrencyContext {
                    available_cpus,
                    ready_tasks: ready_count(workflow),
                    total_tasks: workflow.task_count(),
                    base_concurrency,
                };
                strategy.calculate_concurrency(&context)
            })
            .unwrap_or(base_concurrency)
            .max(1)
    }
}

impl WorkflowExecutorBuilder {
    pub fn max_parallel(mut self, max_parallel: usize) -> Self {
        self.inner.max_parallel = Some(max_parallel.max(1));
        self
    }

    /// Mark downstream tasks Failed when a dependency fails.
    pub fn cascade_failures(mut self, enabled: bool) -> Self {
        self.inner.cascade_failures = enabled;
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn EventRenderer>) -> Self {
        self.inner.renderer = Some(renderer);
        self
    }

    pub fn concurrency_strategy(mut self, strategy: Arc<dyn ConcurrencyStrategy>) -> Self {
        self.inner.concurrency_strategy = Some(strategy);
        self
    }

    pub fn context(mut self, context: Value) -> Self {
        self.inner.context = Some(context);
        self
    }

    /// Default sanitization for task prompts that carry none of their own.
    pub fn sanitization(mut self, config: SanitizationConfig) -> Self {
        self.inner.sanitization = Some(config);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.inner.cancel = token;
        self
    }

    pub fn build(self) -> WorkflowExecutor {
        self.inner
    }
}

fn ready_count(workflow: &Workflow) -> usize {
    workflow
        .graph
        .task_ids()
        .iter()
        .filter(|id| {
            workflow.state.status(id) == TaskStatus::Pending
                && workflow
                    .graph
                    .dependencies(id)
                    .iter()
                    .all(|dep| workflow.state.status(dep) == TaskStatus::Completed)
        })
        .count()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn collect_result(
    workflow: &Workflow,
    run_id: String,
    cancelled: bool,
    duration_ms: u64,
) -> Result<WorkflowResult, WorkflowError> {
    let tasks: BTreeMap<String, TaskOutcome> = workflow
        .graph
        .task_ids()
        .iter()
        .map(|id| {
            let outcome = TaskOutcome {
                status: workflow.state.status(id),
                result: workflow.state.results.get(id).cloned(),
                error: workflow.state.errors.get(id).cloned(),
            };
            (id.clone(), outcome)
        })
        .collect();

    // Deepest completed sink; ties go to the task declared last.
    let depths = workflow.graph.depths()?;
    let result = workflow
        .graph
        .sinks()
        .into_iter()
        .filter(|id| workflow.state.status(id) == TaskStatus::Completed)
        .max_by_key(|id| depths.get(id).copied().unwrap_or(0))
        .and_then(|id| workflow.state.results.get(&id).cloned());

    Ok(WorkflowResult {
        workflow_id: workflow.id.clone(),
        run_id,
        name: workflow.name.clone(),
        tasks,
        events: workflow.state.events.clone(),
        result,
        cancelled,
        duration_ms,
    })
}
