//! Prompt-injection detection and redaction for text bound into prompts.

mod engine;
mod patterns;
mod types;

pub use engine::{sanitize, Sanitizer, REDACTION_MARKER};
pub use types::{InjectionCategory, RedactedSpan, RiskLevel, SanitizationConfig, SanitizationResult};
