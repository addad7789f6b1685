use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use promptloom_core::agent::{EmbeddingConfig, Embedder};
use promptloom_core::error::AgentError;
use promptloom_core::prompt::Provider;

/// Deterministic unit-length vectors derived from a hash of each input.
///
/// Equal inputs embed equally within a process; no model is involved.
#[derive(Debug, Clone, Default)]
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn new() -> Self {
        Self
    }

    fn embed_one(input: &str, config: &EmbeddingConfig) -> Vec<f32> {
        let mut vector: Vec<f32> = (0..config.dimensions)
            .map(|i| {
                let mut hasher = DefaultHasher::new();
                config.model.hash(&mut hasher);
                input.hash(&mut hasher);
                i.hash(&mut hasher);
                // Map the hash onto [-1, 1].
                (hasher.finish() as f64 / u64::MAX as f64 * 2.0 - 1.0) as f32
            })
            .collect();

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn provider(&self) -> Provider {
        Provider::Undefined
    }

    async fn embed_batch(
        &self,
        inputs: &[String],
        config: &EmbeddingConfig,
    ) -> Result<Vec<Vec<f32>>, AgentError> {
        Ok(inputs
            .iter()
            .map(|input| Self::embed_one(input, config))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptloom_core::agent::{embed, embed_batch};

    #[tokio::test]
    async fn test_vectors_have_configured_length() {
        let config = EmbeddingConfig::new("hash-small", 16);
        let vector = embed(&HashEmbedder::new(), "hello", &config).await.unwrap();
        assert_eq!(vector.len(), 16);

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_embedding_is_deterministic() {
        let config = EmbeddingConfig::new("hash-small", 8);
        let inputs = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let vectors = embed_batch(&HashEmbedder::new(), &inputs, &config)
            .await
            .unwrap();
        assert_eq!(vectors[0], vectors[2]);
        assert_ne!(vectors[0], vectors[1]);
    }
}
