//! Prompt and message model plus the placeholder binding engine.

mod file;
mod message;
mod placeholder;
mod prompt;
mod provider;
mod value;

pub use file::PromptFormat;
pub use message::{ContentPart, Message, Role};
pub use placeholder::{extract_placeholders, PlaceholderKey};
pub use prompt::Prompt;
pub use provider::Provider;
pub use value::render_value;
