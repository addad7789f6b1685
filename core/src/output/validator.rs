use serde_json::Value;
use tracing::debug;

use super::schema::OutputSchema;
use crate::error::OutputError;

/// Strip a surrounding markdown code fence, if any.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    match body.find('\n') {
        Some(idx) => body[idx + 1..].trim(),
        None => body.trim(),
    }
}

/// Parse and validate a raw response against `schema`.
pub fn parse_structured(raw: &str, schema: &OutputSchema) -> Result<Value, OutputError> {
    let body = strip_code_fence(raw);
    let value: Value = serde_json::from_str(body).map_err(|e| OutputError::MalformedJson {
        reason: e.to_string(),
    })?;
    schema.validate(&value)?;
    debug!(schema = schema.name(), "structured output validated");
    Ok(value)
}

/// `Ok(None)` when no schema is declared.
pub fn validate_response(
    raw: &str,
    schema: Option<&OutputSchema>,
) -> Result<Option<Value>, OutputError> {
    schema.map(|s| parse_structured(raw, s)).transpose()
}
