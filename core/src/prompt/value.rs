use serde::Serialize;
use serde_json::Value;

use crate::error::PromptError;

/// Text form of a bound value.
///
/// Strings pass through unchanged, scalars use their canonical JSON form
/// and arrays/objects become compact JSON.
pub fn render_value<V: Serialize + ?Sized>(value: &V) -> Result<String, PromptError> {
    let value = serde_json::to_value(value).map_err(|e| PromptError::Value(e.to_string()))?;
    Ok(match value {
        Value::String(s) => s,
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other @ (Value::Array(_) | Value::Object(_)) => {
            serde_json::to_string(&other).map_err(|e| PromptError::Value(e.to_string()))?
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_scalars_and_records() {
        assert_eq!(render_value("plain").unwrap(), "plain");
        assert_eq!(render_value(&42).unwrap(), "42");
        assert_eq!(render_value(&-1.5).unwrap(), "-1.5");
        assert_eq!(render_value(&true).unwrap(), "true");
        assert_eq!(
            render_value(&json!({"key": "value"})).unwrap(),
            r#"{"key":"value"}"#
        );
        assert_eq!(render_value(&vec![1, 2]).unwrap(), "[1,2]");
    }
}
