use async_trait::async_trait;

use promptloom_core::agent::{Agent, AgentResponse, Usage};
use promptloom_core::error::AgentError;
use promptloom_core::prompt::{Prompt, Provider};

use super::scripted::count_words;

/// Replies with the text of the last user turn, or every text part when there is none.
pub struct EchoAgent {
    id: String,
    provider: Provider,
}

impl EchoAgent {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider: Provider::Undefined,
        }
    }

    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = provider;
        self
    }
}

#[async_trait]
impl Agent for EchoAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn provider(&self) -> Provider {
        self.provider
    }

    async fn execute(&self, prompt: &Prompt) -> Result<AgentResponse, AgentError> {
        let text = prompt
            .last_user_text()
            .unwrap_or_else(|| prompt.text_parts().collect::<Vec<_>>().join("\n"));
        let tokens = count_words(&text);
        Ok(AgentResponse::new(self.provider, prompt.model(), text).with_usage(Usage {
            input_tokens: tokens,
            output_tokens: tokens,
        }))
    }
}
