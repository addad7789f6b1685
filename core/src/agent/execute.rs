use std::time::Instant;

use chrono::Utc;
use tracing::{debug, warn};

use super::traits::{Agent, Embedder};
use super::types::{AgentResponse, EmbeddingConfig};
use crate::error::AgentError;
use crate::output::{validate_response, OutputSchema};
use crate::prompt::Prompt;
use crate::workflow::{Task, TaskResult};

/// Dispatch `prompt` and validate the reply against `schema`, if any.
pub async fn execute_with_schema(
    agent: &dyn Agent,
    prompt: &Prompt,
    schema: Option<&OutputSchema>,
) -> Result<AgentResponse, AgentError> {
    let mut response = agent.execute(prompt).await?;
    response.structured_output = validate_response(&response.text, schema).map_err(|e| {
        warn!(agent = agent.id(), error = %e, "structured output rejected");
        AgentError::Output(e)
    })?;
    Ok(response)
}

/// Dispatch a prompt, validating against the prompt's own output schema.
pub async fn execute_prompt(agent: &dyn Agent, prompt: &Prompt) -> Result<AgentResponse, AgentError> {
    execute_with_schema(agent, prompt, prompt.output_schema()).await
}

/// Run one task outside a workflow. The task's schema override wins over the prompt's.
pub async fn execute_task(agent: &dyn Agent, task: &Task) -> Result<TaskResult, AgentError> {
    let started_at = Utc::now();
    let clock = Instant::now();
    debug!(task_id = task.id(), agent = agent.id(), "executing task");

    let response = execute_with_schema(agent, task.prompt(), task.effective_schema()).await?;

    Ok(TaskResult {
        task_id: task.id().to_string(),
        agent_id: agent.id().to_string(),
        provider: response.provider,
        model: response.model,
        text: response.text,
        structured_output: response.structured_output,
        usage: response.usage,
        started_at,
        completed_at: Utc::now(),
        duration_ms: clock.elapsed().as_millis() as u64,
    })
}

/// Embed a batch, rejecting vectors of the wrong length.
pub async fn embed_batch(
    embedder: &dyn Embedder,
    inputs: &[String],
    config: &EmbeddingConfig,
) -> Result<Vec<Vec<f32>>, AgentError> {
    let vectors = embedder.embed_batch(inputs, config).await?;
    if vectors.len() != inputs.len() {
        return Err(AgentError::InvalidResponse(format!(
            "expected {} embeddings, got {}",
            inputs.len(),
            vectors.len()
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != config.dimensions) {
        return Err(AgentError::EmbeddingDimension {
            expected: config.dimensions,
            actual: bad.len(),
        });
    }
    Ok(vectors)
}

pub async fn embed(
    embedder: &dyn Embedder,
    input: &str,
    config: &EmbeddingConfig,
) -> Result<Vec<f32>, AgentError> {
    let mut vectors = embed_batch(embedder, &[input.to_string()], config).await?;
    vectors
        .pop()
        .ok_or_else(|| AgentError::InvalidResponse("empty embedding batch".to_string()))
}
