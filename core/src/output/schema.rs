use std::fmt;
use std::sync::Arc;

use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::OutputError;

/// A named JSON-schema document, compiled once at construction.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "SchemaDocument", into = "SchemaDocument")]
pub struct OutputSchema {
    name: String,
    schema: Value,
    compiled: Arc<JSONSchema>,
}

#[derive(Serialize, Deserialize)]
struct SchemaDocument {
    name: String,
    schema: Value,
}

impl TryFrom<SchemaDocument> for OutputSchema {
    type Error = OutputError;

    fn try_from(doc: SchemaDocument) -> Result<Self, Self::Error> {
        OutputSchema::new(doc.name, doc.schema)
    }
}

impl From<OutputSchema> for SchemaDocument {
    fn from(schema: OutputSchema) -> Self {
        SchemaDocument {
            name: schema.name,
            schema: schema.schema,
        }
    }
}

impl fmt::Debug for OutputSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSchema")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish()
    }
}

impl PartialEq for OutputSchema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.schema == other.schema
    }
}

impl OutputSchema {
    pub fn new(name: impl Into<String>, schema: Value) -> Result<Self, OutputError> {
        let name = name.into();
        let compiled = JSONSchema::compile(&schema).map_err(|e| OutputError::InvalidSchema {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            name,
            schema,
            compiled: Arc::new(compiled),
        })
    }

    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn validate(&self, instance: &Value) -> Result<(), OutputError> {
        if let Err(errors) = self.compiled.validate(instance) {
            let errors = errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{path}: {e}")
                    }
                })
                .collect();
            return Err(OutputError::SchemaMismatch {
                name: self.name.clone(),
                errors,
            });
        }
        Ok(())
    }
}

/// Field types understood by [`SchemaBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Array(Box<FieldType>),
    /// Any JSON object.
    Object,
}

impl FieldType {
    pub fn array(items: FieldType) -> Self {
        FieldType::Array(Box::new(items))
    }

    fn to_schema(&self) -> Value {
        match self {
            FieldType::String => json!({"type": "string"}),
            FieldType::Integer => json!({"type": "integer"}),
            FieldType::Number => json!({"type": "number"}),
            FieldType::Boolean => json!({"type": "boolean"}),
            FieldType::Array(items) => json!({"type": "array", "items": items.to_schema()}),
            FieldType::Object => json!({"type": "object"}),
        }
    }
}

/// Builds a closed object schema from a list of required fields.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    name: String,
    fields: Vec<(String, FieldType, bool)>,
}

impl SchemaBuilder {
    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push((name.into(), ty, true));
        self
    }

    pub fn optional(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push((name.into(), ty, false));
        self
    }

    pub fn build(self) -> Result<OutputSchema, OutputError> {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for (name, ty, is_required) in &self.fields {
            properties.insert(name.clone(), ty.to_schema());
            if *is_required {
                required.push(Value::String(name.clone()));
            }
        }
        let schema = json!({
            "title": self.name,
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        });
        OutputSchema::new(self.name, schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_schema() -> OutputSchema {
        OutputSchema::builder("Plan")
            .field("tasks", FieldType::array(FieldType::String))
            .field("status", FieldType::String)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_produces_closed_object_schema() {
        let schema = plan_schema();
        assert_eq!(schema.schema()["required"], json!(["tasks", "status"]));
        assert_eq!(schema.schema()["additionalProperties"], json!(false));
    }

    #[test]
    fn test_validate_reports_missing_fields() {
        let schema = plan_schema();
        assert!(schema
            .validate(&json!({"tasks": ["a"], "status": "ok"}))
            .is_ok());

        let err = schema.validate(&json!({"tasks": ["a"]})).unwrap_err();
        match err {
            OutputError::SchemaMismatch { name, errors } => {
                assert_eq!(name, "Plan");
                assert!(errors.iter().any(|e| e.contains("status")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_schema_is_rejected() {
        let err = OutputSchema::new("Bad", json!({"type": 12})).unwrap_err();
        assert!(matches!(err, OutputError::InvalidSchema { .. }));
    }

    #[test]
    fn test_serde_round_trip_recompiles() {
        let schema = plan_schema();
        let json = serde_json::to_string(&schema).unwrap();
        let back: OutputSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
        assert!(back.validate(&json!({"tasks": 1, "status": "x"})).is_err());
    }
}
