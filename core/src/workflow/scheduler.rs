use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use serde_json::{Map, Value};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::{execute_with_schema, Agent, AgentResponse};
use crate::error::{AgentError, PromptError, WorkflowError};
use crate::output::OutputSchema;
use crate::prompt::{PlaceholderKey, Prompt, Role};
use crate::sanitize::SanitizationConfig;

use super::task::{Task, TaskResult, TaskStatus};
use super::traits::{EventRenderer, RenderEvent};
use super::workflow::Workflow;

/// Settings for one pass of the driver loop.
pub(super) struct DriveOptions<'a> {
    pub run_id: &'a str,
    pub pool_size: usize,
    pub cascade_failures: bool,
    pub context: Option<&'a Map<String, Value>>,
    /// Applied to task prompts that carry no sanitization config of their own.
    pub sanitization: Option<&'a SanitizationConfig>,
    pub renderer: &'a Option<Arc<dyn EventRenderer>>,
    pub cancel: &'a CancellationToken,
}

/// A finished agent call, handed back to the driver loop.
struct Dispatched {
    task_id: String,
    agent_id: String,
    started_at: DateTime<Utc>,
    duration_ms: u64,
    outcome: Result<AgentResponse, AgentError>,
}

/// Dispatch ready tasks until nothing is ready and nothing is in flight.
///
/// Workers only call the agent; every status change, result and event is
/// written here, one task completion at a time. Returns whether the run was
/// cancelled.
pub(super) async fn drive(
    workflow: &mut Workflow,
    opts: &DriveOptions<'_>,
) -> Result<bool, WorkflowError> {
    let semaphore = Arc::new(Semaphore::new(opts.pool_size));
    let mut in_flight = FuturesUnordered::new();
    let mut cancelled = opts.cancel.is_cancelled();

    loop {
        if !cancelled {
            for task_id in ready_tasks(workflow) {
                let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                    break;
                };

                let task = workflow
                    .tasks
                    .get(&task_id)
                    .cloned()
                    .ok_or_else(|| WorkflowError::TaskNotFound(task_id.clone()))?;

                workflow.state.transition(
                    &workflow.id,
                    &task_id,
                    TaskStatus::Running,
                    None,
                    None,
                )?;
                emit(
                    opts.renderer,
                    RenderEvent::TaskStart {
                        run_id: opts.run_id.to_string(),
                        task_id: task_id.clone(),
                        agent_id: task.agent_id().to_string(),
                    },
                );

                match prepare_prompt(workflow, &task, opts) {
                    Ok(prompt) => {
                        let agent = workflow
                            .agents
                            .get(task.agent_id())
                            .and_then(|slot| slot.handle.clone());
                        debug!(task_id = %task_id, agent = %task.agent_id(), "dispatching task");
                        in_flight.push(dispatch(
                            agent,
                            task.agent_id().to_string(),
                            task_id,
                            prompt,
                            task.effective_schema().cloned(),
                            permit,
                        ));
                    }
                    Err(e) => fail_task(workflow, &task_id, e.to_string(), 0, opts)?,
                }
            }
        }

        if in_flight.is_empty() {
            break;
        }

        tokio::select! {
            Some(done) = in_flight.next() => finish_task(workflow, done, opts)?,
            _ = opts.cancel.cancelled(), if !cancelled => {
                cancelled = true;
                info!(run_id = %opts.run_id, "cancellation requested, draining in-flight tasks");
            }
        }
    }

    Ok(cancelled || opts.cancel.is_cancelled())
}

/// Pending tasks whose dependencies all completed, in declaration order.
fn ready_tasks(workflow: &Workflow) -> Vec<String> {
    workflow
        .graph
        .task_ids()
        .iter()
        .filter(|id| workflow.state.status(id) == TaskStatus::Pending)
        .filter(|id| {
            workflow
                .graph
                .dependencies(id)
                .iter()
                .all(|dep| workflow.state.status(dep) == TaskStatus::Completed)
        })
        .cloned()
        .collect()
}

/// Bind the run context and dependency results into a copy of the task prompt.
///
/// Each dependency offers `${<dep_id>}` (its text) and, for object outputs,
/// `${<field>}` per top-level field. Offers are matched against the task's own
/// placeholders and bound together in one pass, so text that arrives from one
/// dependency is never filled in from another. Context keys come first, then
/// dependencies in declaration order; the first source to claim a key wins. A
/// dependency that claims nothing is appended as a verbatim assistant turn.
fn prepare_prompt(
    workflow: &Workflow,
    task: &Task,
    opts: &DriveOptions<'_>,
) -> Result<Prompt, PromptError> {
    let mut prompt = task.prompt().clone();
    if prompt.sanitization().is_none() {
        if let Some(config) = opts.sanitization {
            prompt = prompt.with_sanitization(config.clone());
        }
    }

    let present = prompt.placeholders();
    let mut claimed: Vec<PlaceholderKey> = Vec::new();
    let mut pairs: Vec<(String, Value)> = Vec::new();
    let mut claim = |key: &str, value: &Value, pairs: &mut Vec<(String, Value)>| {
        let canonical = PlaceholderKey::parse(key);
        if present.contains(&canonical) && !claimed.contains(&canonical) {
            claimed.push(canonical);
            pairs.push((key.to_string(), value.clone()));
            true
        } else {
            false
        }
    };

    if let Some(context) = opts.context {
        for (key, value) in context {
            claim(key.as_str(), value, &mut pairs);
        }
    }

    let mut unclaimed: Vec<(&str, &TaskResult)> = Vec::new();
    for dep in task.dependencies() {
        let Some(result) = workflow.state.results.get(dep) else {
            continue;
        };

        let mut matched = claim(dep.as_str(), &Value::String(result.text.clone()), &mut pairs);
        if let Some(Value::Object(fields)) = &result.structured_output {
            for (field, value) in fields {
                matched |= claim(field.as_str(), value, &mut pairs);
            }
        }
        if !matched {
            unclaimed.push((dep.as_str(), result));
        }
    }

    prompt.bind_all_mut(pairs)?;

    for (dep, result) in unclaimed {
        debug!(task_id = %task.id(), dependency = %dep, "appending dependency output as assistant turn");
        prompt.push_external(Role::Assistant, &result.text)?;
    }

    Ok(prompt)
}

async fn dispatch(
    agent: Option<Arc<dyn Agent>>,
    agent_id: String,
    task_id: String,
    prompt: Prompt,
    schema: Option<OutputSchema>,
    _permit: OwnedSemaphorePermit,
) -> Dispatched {
    let started_at = Utc::now();
    let clock = Instant::now();

    let outcome = match agent {
        Some(agent) => execute_with_schema(agent.as_ref(), &prompt, schema.as_ref()).await,
        None => Err(AgentError::Unbound(agent_id.clone())),
    };

    Dispatched {
        task_id,
        agent_id,
        started_at,
        duration_ms: clock.elapsed().as_millis() as u64,
        outcome,
    }
}

fn finish_task(
    workflow: &mut Workflow,
    done: Dispatched,
    opts: &DriveOptions<'_>,
) -> Result<(), WorkflowError> {
    let response = match done.outcome {
        Ok(response) => response,
        Err(e) => return fail_task(workflow, &done.task_id, e.to_string(), done.duration_ms, opts),
    };

    let result = TaskResult {
        task_id: done.task_id.clone(),
        agent_id: done.agent_id,
        provider: response.provider,
        model: response.model,
        text: response.text,
        structured_output: response.structured_output,
        usage: response.usage,
        started_at: done.started_at,
        completed_at: Utc::now(),
        duration_ms: done.duration_ms,
    };
    workflow.state.complete(&workflow.id, result)?;

    debug!(task_id = %done.task_id, duration_ms = done.duration_ms, "task completed");
    emit(
        opts.renderer,
        RenderEvent::TaskEnd {
            run_id: opts.run_id.to_string(),
            task_id: done.task_id,
            status: TaskStatus::Completed,
            duration_ms: done.duration_ms,
            error: None,
        },
    );
    Ok(())
}

fn fail_task(
    workflow: &mut Workflow,
    task_id: &str,
    error: String,
    duration_ms: u64,
    opts: &DriveOptions<'_>,
) -> Result<(), WorkflowError> {
    warn!(task_id = %task_id, error = %error, "task failed");
    workflow.state.transition(
        &workflow.id,
        task_id,
        TaskStatus::Failed,
        Some(error.clone()),
        Some(duration_ms),
    )?;
    emit(
        opts.renderer,
        RenderEvent::TaskEnd {
            run_id: opts.run_id.to_string(),
            task_id: task_id.to_string(),
            status: TaskStatus::Failed,
            duration_ms,
            error: Some(error),
        },
    );

    if !opts.cascade_failures {
        return Ok(());
    }

    for dependent in workflow.graph.transitive_dependents(task_id) {
        if workflow.state.status(&dependent) != TaskStatus::Pending {
            continue;
        }
        let detail = format!("dependency failed: {task_id}");
        workflow.state.transition(
            &workflow.id,
            &dependent,
            TaskStatus::Failed,
            Some(detail.clone()),
            None,
        )?;
        emit(
            opts.renderer,
            RenderEvent::TaskEnd {
                run_id: opts.run_id.to_string(),
                task_id: dependent,
                status: TaskStatus::Failed,
                duration_ms: 0,
                error: Some(detail),
            },
        );
    }
    Ok(())
}

pub(super) fn emit(renderer: &Option<Arc<dyn EventRenderer>>, event: RenderEvent) {
    if let Some(renderer) = renderer {
        renderer.render(&event);
    }
}
