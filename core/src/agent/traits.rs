use async_trait::async_trait;

use super::types::{AgentResponse, EmbeddingConfig};
use crate::error::AgentError;
use crate::prompt::{Prompt, Provider};

/// A model-backed executor of prompts. Transport and wire formats live behind this trait.
#[async_trait]
pub trait Agent: Send + Sync {
    fn id(&self) -> &str;

    fn provider(&self) -> Provider;

    async fn execute(&self, prompt: &Prompt) -> Result<AgentResponse, AgentError>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    fn provider(&self) -> Provider;

    async fn embed_batch(
        &self,
        inputs: &[String],
        config: &EmbeddingConfig,
    ) -> Result<Vec<Vec<f32>>, AgentError>;
}
