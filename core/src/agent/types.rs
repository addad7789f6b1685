use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::prompt::Provider;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// What an agent returns for one prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub id: String,
    pub provider: Provider,
    pub model: String,
    /// Raw text produced by the model.
    pub text: String,
    /// Present only when a schema was declared and the text validated against it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    pub created_at: DateTime<Utc>,
}

impl AgentResponse {
    pub fn new(provider: Provider, model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            provider,
            model: model.into(),
            text: text.into(),
            structured_output: None,
            usage: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Embedding request parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    /// Length every returned vector must have.
    pub dimensions: usize,
}

impl EmbeddingConfig {
    pub fn new(model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model: model.into(),
            dimensions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_total_saturates() {
        let usage = Usage {
            input_tokens: 3,
            output_tokens: 4,
        };
        assert_eq!(usage.total(), 7);

        let huge = Usage {
            input_tokens: u64::MAX,
            output_tokens: 1,
        };
        assert_eq!(huge.total(), u64::MAX);
    }
}
