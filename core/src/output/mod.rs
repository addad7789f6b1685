//! Structured output: schema descriptors and response validation.

mod schema;
mod validator;

pub use schema::{FieldType, OutputSchema, SchemaBuilder};
pub use validator::{parse_structured, validate_response};
