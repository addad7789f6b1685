use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::message::{ContentPart, Message, Role};
use super::placeholder::PlaceholderKey;
use super::provider::Provider;
use super::value::render_value;
use crate::error::PromptError;
use crate::output::OutputSchema;
use crate::sanitize::{SanitizationConfig, SanitizationResult, Sanitizer};

/// A model request template: conversation, system instructions and settings.
///
/// Prompts are values. `bind` returns a new prompt; `bind_mut` edits in place.
/// Placeholders that were never bound stay in the text verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "PromptDocument")]
pub struct Prompt {
    model: String,
    provider: Provider,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system_instructions: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_schema: Option<OutputSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model_settings: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sanitization: Option<SanitizationConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sanitization_results: Vec<SanitizationResult>,
}

/// Equality covers content and settings; the sanitization audit trail is ignored.
impl PartialEq for Prompt {
    fn eq(&self, other: &Self) -> bool {
        self.model == other.model
            && self.provider == other.provider
            && self.messages == other.messages
            && self.system_instructions == other.system_instructions
            && self.output_schema == other.output_schema
            && self.model_settings == other.model_settings
            && self.sanitization == other.sanitization
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MessageItem {
    Text(String),
    Message(Message),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MessagesDocument {
    Many(Vec<MessageItem>),
    One(MessageItem),
}

impl Default for MessagesDocument {
    fn default() -> Self {
        MessagesDocument::Many(Vec::new())
    }
}

impl MessagesDocument {
    fn into_messages(self, text_role: Role) -> Vec<Message> {
        let items = match self {
            MessagesDocument::Many(items) => items,
            MessagesDocument::One(item) => vec![item],
        };
        items
            .into_iter()
            .map(|item| match item {
                MessageItem::Text(text) => Message::new(text_role, text),
                MessageItem::Message(message) => message,
            })
            .collect()
    }
}

/// On-disk prompt layout; `messages` and `system_instructions` accept plain strings.
#[derive(Deserialize)]
struct PromptDocument {
    #[serde(default)]
    model: String,
    #[serde(default)]
    provider: Provider,
    #[serde(default)]
    messages: MessagesDocument,
    #[serde(default)]
    system_instructions: MessagesDocument,
    #[serde(default, alias = "output_type")]
    output_schema: Option<OutputSchema>,
    #[serde(default)]
    model_settings: Option<Value>,
    #[serde(default)]
    sanitization: Option<SanitizationConfig>,
    #[serde(default)]
    sanitization_results: Vec<SanitizationResult>,
}

impl From<PromptDocument> for Prompt {
    fn from(doc: PromptDocument) -> Self {
        Prompt {
            model: doc.model,
            provider: doc.provider,
            messages: doc.messages.into_messages(Role::User),
            system_instructions: doc.system_instructions.into_messages(Role::System),
            output_schema: doc.output_schema,
            model_settings: doc.model_settings,
            sanitization: doc.sanitization,
            sanitization_results: doc.sanitization_results,
        }
    }
}

impl Prompt {
    pub fn new(model: impl Into<String>, provider: Provider, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            provider,
            messages,
            system_instructions: Vec::new(),
            output_schema: None,
            model_settings: None,
            sanitization: None,
            sanitization_results: Vec::new(),
        }
    }

    /// Single user-message prompt.
    pub fn from_text(model: impl Into<String>, provider: Provider, text: impl Into<String>) -> Self {
        Self::new(model, provider, vec![Message::user(text)])
    }

    pub fn with_system_instruction(mut self, text: impl Into<String>) -> Self {
        self.system_instructions.push(Message::system(text));
        self
    }

    pub fn with_system_message(mut self, message: Message) -> Self {
        self.system_instructions.push(message);
        self
    }

    pub fn with_output_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_model_settings(mut self, settings: Value) -> Self {
        self.model_settings = Some(settings);
        self
    }

    pub fn with_sanitization(mut self, config: SanitizationConfig) -> Self {
        self.sanitization = Some(config);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model_identifier(&self) -> String {
        format!("{}:{}", self.provider, self.model)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn system_instructions(&self) -> &[Message] {
        &self.system_instructions
    }

    pub fn output_schema(&self) -> Option<&OutputSchema> {
        self.output_schema.as_ref()
    }

    pub fn model_settings(&self) -> Option<&Value> {
        self.model_settings.as_ref()
    }

    pub fn sanitization(&self) -> Option<&SanitizationConfig> {
        self.sanitization.as_ref()
    }

    pub fn sanitization_results(&self) -> &[SanitizationResult] {
        &self.sanitization_results
    }

    /// Append a conversation turn.
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append externally sourced text as a verbatim turn, sanitized first when
    /// the prompt carries a sanitization config. On rejection the prompt is
    /// left unchanged.
    pub fn push_external(&mut self, role: Role, text: &str) -> Result<(), PromptError> {
        let text = match &self.sanitization {
            Some(config) => {
                let result = Sanitizer::new(config.clone())?.sanitize(text)?;
                let sanitized = result.sanitized.clone();
                self.sanitization_results.push(result);
                sanitized
            }
            None => text.to_string(),
        };
        self.messages.push(Message::literal(role, text));
        Ok(())
    }

    fn all_messages(&self) -> impl Iterator<Item = &Message> {
        self.system_instructions.iter().chain(self.messages.iter())
    }

    /// Text of the last user turn, if any.
    pub fn last_user_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role() == Role::User && m.content().iter().any(|p| p.as_text().is_some()))
            .map(Message::text)
    }

    pub fn placeholders(&self) -> Vec<PlaceholderKey> {
        let mut keys: Vec<PlaceholderKey> = Vec::new();
        for key in self.all_messages().flat_map(Message::placeholders) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Placeholder names across system instructions and messages, sorted.
    pub fn parameters(&self) -> Vec<String> {
        let mut names: Vec<String> = self.placeholders().iter().map(ToString::to_string).collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn has_placeholder<K: Into<PlaceholderKey>>(&self, key: K) -> bool {
        let key = key.into().canonical();
        self.placeholders().contains(&key)
    }

    pub fn bind<K, V>(&self, key: K, value: &V) -> Result<Prompt, PromptError>
    where
        K: Into<PlaceholderKey>,
        V: Serialize + ?Sized,
    {
        let mut bound = self.clone();
        bound.bind_mut(key, value)?;
        Ok(bound)
    }

    pub fn bind_mut<K, V>(&mut self, key: K, value: &V) -> Result<(), PromptError>
    where
        K: Into<PlaceholderKey>,
        V: Serialize + ?Sized,
    {
        self.bind_all_mut(std::iter::once((key, value)))
    }

    /// Bind several keys in one pass. A key given twice keeps its first value.
    pub fn bind_all<I, K, V>(&self, pairs: I) -> Result<Prompt, PromptError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<PlaceholderKey>,
        V: Serialize,
    {
        let mut bound = self.clone();
        bound.bind_all_mut(pairs)?;
        Ok(bound)
    }

    pub fn bind_all_mut<I, K, V>(&mut self, pairs: I) -> Result<(), PromptError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<PlaceholderKey>,
        V: Serialize,
    {
        let mut rendered: Vec<(PlaceholderKey, String)> = Vec::new();
        for (key, value) in pairs {
            let key = key.into();
            key.validate()?;
            let key = key.canonical();
            if rendered.iter().any(|(existing, _)| *existing == key) {
                continue;
            }
            rendered.push((key, render_value(&value)?));
        }

        let present = self.placeholders();
        let sanitizer = self
            .sanitization
            .as_ref()
            .map(|config| Sanitizer::new(config.clone()))
            .transpose()?;

        // Everything that can fail runs before the prompt is touched.
        let mut values = HashMap::new();
        let mut results = Vec::new();
        for (key, text) in rendered {
            if !present.contains(&key) {
                debug!(key = %key, "placeholder not present, skipping bind");
                continue;
            }
            let text = match &sanitizer {
                Some(sanitizer) => {
                    let result = sanitizer.sanitize(&text)?;
                    let sanitized = result.sanitized.clone();
                    results.push(result);
                    sanitized
                }
                None => text,
            };
            values.insert(key, text);
        }

        if values.is_empty() {
            return Ok(());
        }

        for message in self
            .system_instructions
            .iter_mut()
            .chain(self.messages.iter_mut())
        {
            message.substitute_mut(&values);
        }
        self.sanitization_results.extend(results);
        Ok(())
    }

    /// Text parts of every message, in order. Used by agents that only read text.
    pub fn text_parts(&self) -> impl Iterator<Item = &str> {
        self.all_messages()
            .flat_map(|m| m.content().iter())
            .filter_map(ContentPart::as_text)
    }
}
