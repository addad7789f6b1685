use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use promptloom_core::agent::{Agent, AgentResponse, Usage};
use promptloom_core::error::AgentError;
use promptloom_core::prompt::{Prompt, Provider};

/// What a [`ScriptedAgent`] answers with.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Fail(AgentError),
}

impl From<&str> for ScriptedReply {
    fn from(text: &str) -> Self {
        ScriptedReply::Text(text.to_string())
    }
}

impl From<String> for ScriptedReply {
    fn from(text: String) -> Self {
        ScriptedReply::Text(text)
    }
}

impl From<AgentError> for ScriptedReply {
    fn from(err: AgentError) -> Self {
        ScriptedReply::Fail(err)
    }
}

/// Agent with canned replies, for offline runs and tests.
///
/// Replies are chosen in this order: the first rule whose needle occurs in
/// the prompt text, then the next queued reply, then the fallback. Every
/// prompt received is recorded.
pub struct ScriptedAgent {
    id: String,
    provider: Provider,
    rules: Vec<(String, ScriptedReply)>,
    queue: Mutex<VecDeque<ScriptedReply>>,
    fallback: Option<ScriptedReply>,
    delay: Option<Duration>,
    received: Mutex<Vec<Prompt>>,
}

impl ScriptedAgent {
    pub fn new(id: impl Into<String>, provider: Provider) -> Self {
        Self {
            id: id.into(),
            provider,
            rules: Vec::new(),
            queue: Mutex::new(VecDeque::new()),
            fallback: None,
            delay: None,
            received: Mutex::new(Vec::new()),
        }
    }

    /// Answer `reply` whenever the prompt text contains `needle`.
    pub fn when(mut self, needle: impl Into<String>, reply: impl Into<ScriptedReply>) -> Self {
        self.rules.push((needle.into(), reply.into()));
        self
    }

    /// Queue a reply for the next call that matches no rule.
    pub fn then(self, reply: impl Into<ScriptedReply>) -> Self {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(reply.into());
        }
        self
    }

    pub fn otherwise(mut self, reply: impl Into<ScriptedReply>) -> Self {
        self.fallback = Some(reply.into());
        self
    }

    /// Sleep before answering, to keep calls in flight.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Prompts received so far, in call order.
    pub fn received(&self) -> Vec<Prompt> {
        self.received
            .lock()
            .map(|received| received.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.received.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn pick_reply(&self, prompt: &Prompt) -> Option<ScriptedReply> {
        let text: Vec<&str> = prompt.text_parts().collect();
        if let Some((_, reply)) = self
            .rules
            .iter()
            .find(|(needle, _)| text.iter().any(|t| t.contains(needle.as_str())))
        {
            return Some(reply.clone());
        }

        let queued = self
            .queue
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        queued.or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn provider(&self) -> Provider {
        self.provider
    }

    async fn execute(&self, prompt: &Prompt) -> Result<AgentResponse, AgentError> {
        if let Ok(mut received) = self.received.lock() {
            received.push(prompt.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.pick_reply(prompt) {
            Some(ScriptedReply::Text(text)) => {
                debug!(agent = %self.id, "scripted reply");
                let usage = Usage {
                    input_tokens: prompt.text_parts().map(count_words).sum(),
                    output_tokens: count_words(&text),
                };
                Ok(AgentResponse::new(self.provider, prompt.model(), text).with_usage(usage))
            }
            Some(ScriptedReply::Fail(err)) => Err(err),
            None => Err(AgentError::InvalidResponse(format!(
                "scripted agent '{}' has no reply left",
                self.id
            ))),
        }
    }
}

pub(crate) fn count_words(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}
