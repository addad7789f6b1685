use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::placeholder::{extract_unbound, merge_spans, substitute, PlaceholderKey};
use super::value::render_value;
use crate::error::PromptError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    #[default]
    User,
    Assistant,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        f.write_str(s)
    }
}

/// One piece of message content. Only `Text` takes part in binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
        /// Byte ranges filled in by earlier binds. Placeholder tokens inside
        /// them are literal text.
        #[serde(
            default,
            skip_serializing_if = "Vec::is_empty",
            deserialize_with = "deserialize_spans"
        )]
        bound: Vec<Range<usize>>,
    },
    ImageRef {
        url: String,
    },
    DocumentRef {
        url: String,
    },
    Binary {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
        media_type: String,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text {
            text: text.into(),
            bound: Vec::new(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text, .. } => Some(text),
            _ => None,
        }
    }
}

fn deserialize_spans<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<Range<usize>>, D::Error> {
    Vec::<Range<usize>>::deserialize(deserializer).map(merge_spans)
}

mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// A conversation turn. The role is fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MessageDocument")]
pub struct Message {
    role: Role,
    content: Vec<ContentPart>,
}

/// Accepts `"text"`, `{role, content: "text"}` and `{role, content: [parts]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum MessageDocument {
    Shorthand(String),
    Full {
        #[serde(default)]
        role: Role,
        content: ContentDocument,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ContentDocument {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl From<MessageDocument> for Message {
    fn from(doc: MessageDocument) -> Self {
        match doc {
            MessageDocument::Shorthand(text) => Message::user(text),
            MessageDocument::Full { role, content } => match content {
                ContentDocument::Text(text) => Message::new(role, text),
                ContentDocument::Parts(parts) => Message::with_parts(role, parts),
            },
        }
    }
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self::with_parts(role, vec![ContentPart::text(text)])
    }

    pub fn with_parts(role: Role, content: Vec<ContentPart>) -> Self {
        Self { role, content }
    }

    /// A message whose text is taken verbatim: later binds never substitute
    /// placeholder tokens inside it.
    pub fn literal(role: Role, text: impl Into<String>) -> Self {
        let text = text.into();
        let bound = merge_spans(vec![0..text.len()]);
        Self::with_parts(role, vec![ContentPart::Text { text, bound }])
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn tool(text: impl Into<String>) -> Self {
        Self::new(Role::Tool, text)
    }

    pub fn binary(role: Role, data: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self::with_parts(
            role,
            vec![ContentPart::Binary {
                data,
                media_type: media_type.into(),
            }],
        )
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &[ContentPart] {
        &self.content
    }

    pub fn push_part(&mut self, part: ContentPart) {
        self.content.push(part);
    }

    /// All text parts joined with newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn placeholders(&self) -> Vec<PlaceholderKey> {
        let mut keys: Vec<PlaceholderKey> = Vec::new();
        for part in &self.content {
            let ContentPart::Text { text, bound } = part else {
                continue;
            };
            for key in extract_unbound(text, bound) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// Bind one placeholder without sanitization, returning a new message.
    pub fn bind<K, V>(&self, key: K, value: &V) -> Result<Message, PromptError>
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
        let key = key.into();
        key.validate()?;
        let mut values = HashMap::new();
        values.insert(key.canonical(), render_value(value)?);
        self.substitute_mut(&values);
        Ok(())
    }

    pub(crate) fn substitute_mut(&mut self, values: &HashMap<PlaceholderKey, String>) {
        for part in &mut self.content {
            if let ContentPart::Text { text, bound } = part {
                if let Some((new_text, new_bound)) = substitute(text, bound, values) {
                    *text = new_text;
                    *bound = new_bound;
                }
            }
        }
    }
}

/// Raw JSON helper for callers that build messages from loose documents.
impl TryFrom<Value> for Message {
    type Error = PromptError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_bind_replaces_every_occurrence() {
        let msg = Message::user("${x} and ${x} but not ${y}");
        let bound = msg.bind("x", "one").unwrap();
        assert_eq!(bound.text(), "one and one but not ${y}");
        assert_eq!(msg.text(), "${x} and ${x} but not ${y}");
    }

    #[test]
    fn test_bind_formats_records_compactly() {
        let msg = Message::user("Hello ${1}");
        let bound = msg.bind(1usize, &json!({"key": "value"})).unwrap();
        assert_eq!(bound.text(), r#"Hello {"key":"value"}"#);
    }

    #[test]
    fn test_non_text_parts_are_untouched() {
        let mut msg = Message::with_parts(
            Role::User,
            vec![
                ContentPart::ImageRef {
                    url: "https://example.com/${x}.png".into(),
                },
                ContentPart::text("see ${x}"),
            ],
        );
        msg.bind_mut("x", "cat").unwrap();
        assert_eq!(
            msg.content()[0],
            ContentPart::ImageRef {
                url: "https://example.com/${x}.png".into()
            }
        );
        assert_eq!(msg.text(), "see cat");
        assert_eq!(msg.role(), Role::User);
    }

    #[test]
    fn test_chained_binds_do_not_rescan_values() {
        let msg = Message::user("${a} | ${b}");
        let ab = msg.bind("a", "${b}").unwrap().bind("b", "X").unwrap();
        let ba = msg.bind("b", "X").unwrap().bind("a", "${b}").unwrap();

        assert_eq!(ab.text(), "${b} | X");
        assert_eq!(ab, ba);
        assert!(ab.placeholders().is_empty());
    }

    #[test]
    fn test_literal_messages_have_no_placeholders() {
        let mut msg = Message::literal(Role::Assistant, "see ${x}");
        assert!(msg.placeholders().is_empty());
        msg.bind_mut("x", "leak").unwrap();
        assert_eq!(msg.text(), "see ${x}");
        assert!(Message::literal(Role::Tool, "").placeholders().is_empty());
    }

    #[test]
    fn test_bound_ranges_survive_serialization() {
        let bound = Message::user("${a} and ${b}").bind("a", "${b}").unwrap();
        let json = serde_json::to_string(&bound).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();

        assert_eq!(back, bound);
        assert_eq!(back.placeholders(), vec![PlaceholderKey::Named("b".into())]);
        assert_eq!(back.bind("b", "B").unwrap().text(), "${b} and B");
    }

    #[test]
    fn test_plain_text_parts_serialize_without_ranges() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json["content"][0], json!({"type": "text", "text": "hi"}));
    }

    #[test]
    fn test_binary_parts_serialize_as_base64() {
        let msg = Message::binary(Role::User, vec![0, 159, 146, 150], "application/octet-stream");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["content"][0]["type"], "binary");
        assert_eq!(json["content"][0]["data"], "AJ+Slg==");

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_shorthand_documents() {
        let short: Message = serde_json::from_str("\"hi ${name}\"").unwrap();
        assert_eq!(short.role(), Role::User);
        assert_eq!(short.placeholders(), vec![PlaceholderKey::Named("name".into())]);

        let full = Message::try_from(json!({"role": "assistant", "content": "ok"})).unwrap();
        assert_eq!(full, Message::assistant("ok"));
    }
}
