#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use promptloom_core::agent::{Agent, AgentResponse};
use promptloom_core::error::AgentError;
use promptloom_core::prompt::{Prompt, Provider};
use promptloom_core::workflow::{RenderEvent, EventRenderer, Task};

/// In-process agent: replies by substring rule, tracks concurrency and received prompts.
pub struct FakeAgent {
    id: String,
    rules: Vec<(String, Result<String, AgentError>)>,
    default_reply: Option<String>,
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
    received: Mutex<Vec<Prompt>>,
}

impl FakeAgent {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            rules: Vec::new(),
            default_reply: None,
            delay: Duration::from_millis(5),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(mut self, needle: &str, text: &str) -> Self {
        self.rules.push((needle.to_string(), Ok(text.to_string())));
        self
    }

    pub fn fail(mut self, needle: &str, err: AgentError) -> Self {
        self.rules.push((needle.to_string(), Err(err)));
        self
    }

    pub fn default_reply(mut self, text: &str) -> Self {
        self.default_reply = Some(text.to_string());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<Prompt> {
        self.received.lock().unwrap().clone()
    }

    /// The prompt received whose text contains `needle`.
    pub fn prompt_containing(&self, needle: &str) -> Option<Prompt> {
        self.received()
            .into_iter()
            .find(|p| p.text_parts().any(|t| t.contains(needle)))
    }
}

#[async_trait]
impl Agent for FakeAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    async fn execute(&self, prompt: &Prompt) -> Result<AgentResponse, AgentError> {
        self.received.lock().unwrap().push(prompt.clone());

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        let text: Vec<&str> = prompt.text_parts().collect();
        let rule = self
            .rules
            .iter()
            .find(|(needle, _)| text.iter().any(|t| t.contains(needle.as_str())));

        let reply = match rule {
            Some((_, Ok(reply))) => reply.clone(),
            Some((_, Err(err))) => return Err(err.clone()),
            None => match &self.default_reply {
                Some(reply) => reply.clone(),
                None => format!("done: {}", text.join(" | ")),
            },
        };

        Ok(AgentResponse::new(Provider::OpenAI, prompt.model(), reply))
    }
}

/// Renderer that keeps every event it sees.
#[derive(Default)]
pub struct RecordingRenderer {
    events: Mutex<Vec<RenderEvent>>,
}

impl RecordingRenderer {
    pub fn events(&self) -> Vec<RenderEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventRenderer for RecordingRenderer {
    fn name(&self) -> &str {
        "recording"
    }

    fn render(&self, event: &RenderEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub fn prompt(text: &str) -> Prompt {
    Prompt::from_text("test-model", Provider::OpenAI, text)
}

pub fn task(id: &str, agent: &str, text: &str, deps: &[&str]) -> Task {
    Task::new(id, agent, prompt(text)).with_dependencies(deps.iter().copied())
}

pub fn shared(agent: FakeAgent) -> Arc<FakeAgent> {
    Arc::new(agent)
}
